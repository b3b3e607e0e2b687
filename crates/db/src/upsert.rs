use crate::{
    error::{Error, Result, ResultExt},
    reader::{from_millis, to_id},
    reconcile::{reconcile, Child},
};
use chrono::Utc;
use model::{Id, Question, Quiz};
use sqlx::SqliteConnection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Create,
    Update(Id),
}

/// Writes the quiz row and then reconciles its questions. Creation ignores every
/// identifier the caller supplied.
pub(crate) async fn upsert_quiz(conn: &mut SqliteConnection, quiz: &mut Quiz, mode: Mode) -> Result<Id> {
    let id = match mode {
        Mode::Create => {
            quiz.clear_ids();
            insert_quiz(conn, quiz).await.context("error inserting quiz")?
        }
        Mode::Update(id) => {
            update_quiz(conn, quiz, id).await.with_context(|| format!("error updating quiz {id}"))?;
            id
        }
    };
    reconcile(conn, id, &mut quiz.questions).await?;
    Ok(id)
}

async fn insert_quiz(conn: &mut SqliteConnection, quiz: &mut Quiz) -> Result<Id> {
    // Stored at millisecond precision, so truncate up front to keep the aggregate in sync.
    let millis = Utc::now().timestamp_millis();
    let created_at = from_millis(millis)?;
    let result = sqlx::query("INSERT INTO quizzes (title, slug, description, created_at) VALUES (?, ?, ?, ?)")
        .bind(&quiz.title)
        .bind(&quiz.slug)
        .bind(&quiz.description)
        .bind(millis)
        .execute(&mut *conn)
        .await?;
    let id = to_id(result.last_insert_rowid())?;
    quiz.id = Some(id);
    quiz.created_at = Some(created_at);
    log::debug!("inserted quiz {id}");
    Ok(id)
}

async fn update_quiz(conn: &mut SqliteConnection, quiz: &mut Quiz, id: Id) -> Result<()> {
    let created: i64 = sqlx::query_scalar(
        "UPDATE quizzes SET title = ?, slug = ?, description = ? WHERE id = ? RETURNING created_at",
    )
    .bind(&quiz.title)
    .bind(&quiz.slug)
    .bind(&quiz.description)
    .bind(id.get())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(Error::QuizNotUpdated(id))?;
    quiz.created_at = Some(from_millis(created)?);
    Ok(())
}

/// Inserts a standalone question under `quiz` together with its options.
pub(crate) async fn insert_question(conn: &mut SqliteConnection, question: &mut Question, quiz: Id) -> Result<Id> {
    question.adopt(quiz);
    let id = question.insert(conn, quiz).await.context("error inserting question")?;
    question.reconcile_children(conn, id).await.with_context(|| format!("error upserting question {id}"))?;
    Ok(id)
}

/// Updates a standalone question in whichever quiz actually owns it, then reconciles its
/// options.
pub(crate) async fn update_question(conn: &mut SqliteConnection, question: &mut Question, id: Id) -> Result<()> {
    let quiz: i64 =
        sqlx::query_scalar("UPDATE questions SET text = ?, image_url = ?, position = ? WHERE id = ? RETURNING quiz_id")
            .bind(&question.text)
            .bind(question.image_url.as_deref())
            .bind(question.position)
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(Error::QuestionNotUpdated(id))
            .with_context(|| format!("error updating question {id}"))?;
    question.adopt(to_id(quiz)?);
    question.reconcile_children(conn, id).await.with_context(|| format!("error upserting question {id}"))
}
