//! Makes the children stored under a parent row match a desired list.
//!
//! The same algorithm runs for questions under a quiz and for options under a question:
//! read the identifiers currently stored under the parent, insert or update every desired
//! child in caller order, then delete whatever was stored but not claimed. Updates are
//! scoped to the parent, so naming a row that belongs elsewhere fails as "not updated"
//! instead of stealing it.

use crate::{
    error::{Error, Result, ResultExt},
    reader::to_id,
};
use model::{Choice, Id, Question};
use sqlx::SqliteConnection;
use std::collections::BTreeSet;

/// Storage operations for one kind of child entity.
pub(crate) trait Child {
    /// Entity name used in error context.
    const KIND: &'static str;

    fn id(&self) -> Option<Id>;

    /// Overwrites the parent reference. Callers never get to choose the parent.
    fn adopt(&mut self, parent: Id);

    async fn existing(conn: &mut SqliteConnection, parent: Id) -> Result<BTreeSet<Id>>;

    /// Inserts a fresh row and records its identifier on `self`.
    async fn insert(&mut self, conn: &mut SqliteConnection, parent: Id) -> Result<Id>;

    /// Fails with the kind's "not updated" error when no row matched `id` under `parent`.
    async fn update(&self, conn: &mut SqliteConnection, parent: Id, id: Id) -> Result<()>;

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()>;

    async fn reconcile_children(&mut self, _conn: &mut SqliteConnection, _id: Id) -> Result<()> {
        Ok(())
    }
}

pub(crate) async fn reconcile<C: Child>(conn: &mut SqliteConnection, parent: Id, desired: &mut [C]) -> Result<()> {
    let mut stale = C::existing(conn, parent)
        .await
        .with_context(|| format!("error listing {}s of {parent}", C::KIND))?;

    for (index, child) in desired.iter_mut().enumerate() {
        child.adopt(parent);
        let id = match child.id() {
            Some(id) => {
                child.update(conn, parent, id).await.with_context(|| format!("error upserting {} {id}", C::KIND))?;
                stale.remove(&id);
                id
            }
            None => child
                .insert(conn, parent)
                .await
                .with_context(|| format!("error inserting {} at index {index}", C::KIND))?,
        };
        child.reconcile_children(conn, id).await.with_context(|| format!("error upserting {} {id}", C::KIND))?;
    }

    for id in stale {
        C::delete(conn, id).await.with_context(|| format!("error deleting {} {id}", C::KIND))?;
        log::debug!("deleted {} {id} from {parent}", C::KIND);
    }

    Ok(())
}

fn collect_ids(raw: Vec<i64>) -> Result<BTreeSet<Id>> {
    raw.into_iter().map(to_id).collect()
}

impl Child for Question {
    const KIND: &'static str = "question";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn adopt(&mut self, parent: Id) {
        self.quiz_id = Some(parent);
    }

    async fn existing(conn: &mut SqliteConnection, parent: Id) -> Result<BTreeSet<Id>> {
        let raw = sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE quiz_id = ?")
            .bind(parent.get())
            .fetch_all(&mut *conn)
            .await?;
        collect_ids(raw)
    }

    async fn insert(&mut self, conn: &mut SqliteConnection, parent: Id) -> Result<Id> {
        // A brand new question cannot own previously persisted options.
        self.clear_option_ids();
        let result = sqlx::query("INSERT INTO questions (quiz_id, text, image_url, position) VALUES (?, ?, ?, ?)")
            .bind(parent.get())
            .bind(&self.text)
            .bind(self.image_url.as_deref())
            .bind(self.position)
            .execute(&mut *conn)
            .await?;
        let id = to_id(result.last_insert_rowid())?;
        self.id = Some(id);
        log::debug!("inserted question {id} into quiz {parent}");
        Ok(id)
    }

    async fn update(&self, conn: &mut SqliteConnection, parent: Id, id: Id) -> Result<()> {
        let result = sqlx::query(
            "UPDATE questions SET text = ?, image_url = ?, position = ? WHERE id = ? AND quiz_id = ?",
        )
        .bind(&self.text)
        .bind(self.image_url.as_deref())
        .bind(self.position)
        .bind(id.get())
        .bind(parent.get())
        .execute(&mut *conn)
        .await?;
        match result.rows_affected() {
            0 => Err(Error::QuestionNotUpdated(id)),
            _ => Ok(()),
        }
    }

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
        sqlx::query("DELETE FROM questions WHERE id = ?").bind(id.get()).execute(&mut *conn).await?;
        Ok(())
    }

    async fn reconcile_children(&mut self, conn: &mut SqliteConnection, id: Id) -> Result<()> {
        reconcile(conn, id, &mut self.options).await
    }
}

impl Child for Choice {
    const KIND: &'static str = "option";

    fn id(&self) -> Option<Id> {
        self.id
    }

    fn adopt(&mut self, parent: Id) {
        self.question_id = Some(parent);
    }

    async fn existing(conn: &mut SqliteConnection, parent: Id) -> Result<BTreeSet<Id>> {
        let raw = sqlx::query_scalar::<_, i64>("SELECT id FROM options WHERE question_id = ?")
            .bind(parent.get())
            .fetch_all(&mut *conn)
            .await?;
        collect_ids(raw)
    }

    async fn insert(&mut self, conn: &mut SqliteConnection, parent: Id) -> Result<Id> {
        let result = sqlx::query("INSERT INTO options (question_id, text, is_correct) VALUES (?, ?, ?)")
            .bind(parent.get())
            .bind(&self.text)
            .bind(self.correct)
            .execute(&mut *conn)
            .await?;
        let id = to_id(result.last_insert_rowid())?;
        self.id = Some(id);
        Ok(id)
    }

    async fn update(&self, conn: &mut SqliteConnection, parent: Id, id: Id) -> Result<()> {
        let result = sqlx::query("UPDATE options SET text = ?, is_correct = ? WHERE id = ? AND question_id = ?")
            .bind(&self.text)
            .bind(self.correct)
            .bind(id.get())
            .bind(parent.get())
            .execute(&mut *conn)
            .await?;
        match result.rows_affected() {
            0 => Err(Error::ChoiceNotUpdated(id)),
            _ => Ok(()),
        }
    }

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
        sqlx::query("DELETE FROM options WHERE id = ?").bind(id.get()).execute(&mut *conn).await?;
        Ok(())
    }
}
