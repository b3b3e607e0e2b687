//! Assembles aggregates from flat rows. Questions come back ordered by `(position, id)`
//! and options by `id`, but callers that care about presentation order should still
//! sort by position themselves: positions are not guaranteed to be unique.

use crate::error::{Error, Result, ResultExt};
use model::{Choice, DateTime, Id, Question, Quiz, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use std::collections::HashMap;

pub(crate) fn to_id(raw: i64) -> Result<Id> {
    Id::new(raw).ok_or(Error::InvalidId)
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or(Error::InvalidId)
}

fn deserialize_quiz_from_row(row: &SqliteRow) -> Result<Quiz> {
    let id = to_id(row.try_get("id")?)?;
    let created_at = from_millis(row.try_get("created_at")?)?;
    Ok(Quiz {
        id: Some(id),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        created_at: Some(created_at),
        questions: Vec::new(),
    })
}

fn deserialize_question_from_row(row: &SqliteRow) -> Result<Question> {
    Ok(Question {
        id: Some(to_id(row.try_get("id")?)?),
        quiz_id: Some(to_id(row.try_get("quiz_id")?)?),
        text: row.try_get("text")?,
        image_url: row.try_get("image_url")?,
        position: row.try_get("position")?,
        options: Vec::new(),
    })
}

fn deserialize_choice_from_row(row: &SqliteRow) -> Result<Choice> {
    Ok(Choice {
        id: Some(to_id(row.try_get("id")?)?),
        question_id: Some(to_id(row.try_get("question_id")?)?),
        text: row.try_get("text")?,
        correct: row.try_get("is_correct")?,
    })
}

pub(crate) async fn quiz_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Quiz> {
    let row = sqlx::query("SELECT id, title, slug, description, created_at FROM quizzes WHERE id = ?")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::QuizNotFound)?;
    let mut quiz = deserialize_quiz_from_row(&row)?;
    quiz.questions = questions_of(conn, id).await?;
    Ok(quiz)
}

pub(crate) async fn quiz_by_slug(conn: &mut SqliteConnection, slug: &str) -> Result<Quiz> {
    let row = sqlx::query("SELECT id, title, slug, description, created_at FROM quizzes WHERE slug = ?")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::QuizNotFound)?;
    let mut quiz = deserialize_quiz_from_row(&row)?;
    if let Some(id) = quiz.id {
        quiz.questions = questions_of(conn, id).await?;
    }
    Ok(quiz)
}

pub(crate) async fn all_quizzes(conn: &mut SqliteConnection) -> Result<Vec<Quiz>> {
    let rows = sqlx::query("SELECT id, title, slug, description, created_at FROM quizzes ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    let mut quizzes = Vec::with_capacity(rows.len());
    for row in rows {
        let mut quiz = deserialize_quiz_from_row(&row)?;
        if let Some(id) = quiz.id {
            quiz.questions = questions_of(conn, id).await.with_context(|| format!("error loading quiz {id}"))?;
        }
        quizzes.push(quiz);
    }
    Ok(quizzes)
}

pub(crate) async fn question_by_id(conn: &mut SqliteConnection, id: Id) -> Result<Question> {
    let row = sqlx::query("SELECT id, quiz_id, text, image_url, position FROM questions WHERE id = ?")
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::QuestionNotFound)?;
    let mut question = deserialize_question_from_row(&row)?;
    let rows = sqlx::query("SELECT id, question_id, text, is_correct FROM options WHERE question_id = ? ORDER BY id")
        .bind(id.get())
        .fetch_all(&mut *conn)
        .await?;
    question.options = rows.iter().map(deserialize_choice_from_row).collect::<Result<_>>()?;
    Ok(question)
}

/// Loads every question of the quiz along with their options in two queries.
async fn questions_of(conn: &mut SqliteConnection, quiz: Id) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        "SELECT id, quiz_id, text, image_url, position FROM questions WHERE quiz_id = ? ORDER BY position, id",
    )
    .bind(quiz.get())
    .fetch_all(&mut *conn)
    .await?;
    let mut questions: Vec<_> = rows.iter().map(deserialize_question_from_row).collect::<Result<_>>()?;

    let rows = sqlx::query(
        "SELECT o.id, o.question_id, o.text, o.is_correct FROM options o \
         JOIN questions q ON q.id = o.question_id \
         WHERE q.quiz_id = ? ORDER BY o.id",
    )
    .bind(quiz.get())
    .fetch_all(&mut *conn)
    .await?;

    let mut options = HashMap::<Id, Vec<Choice>>::new();
    for row in &rows {
        let choice = deserialize_choice_from_row(row)?;
        let parent = choice.question_id.ok_or(Error::InvalidId)?;
        options.entry(parent).or_default().push(choice);
    }

    for question in &mut questions {
        if let Some(found) = question.id.and_then(|id| options.remove(&id)) {
            question.options = found;
        }
    }
    Ok(questions)
}
