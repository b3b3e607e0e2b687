use crate::error::{Result, ResultExt};
use sqlx::{migrate::Migrator, SqlitePool};
use std::path::PathBuf;

static EMBEDDED: Migrator = sqlx::migrate!("./migrations");

/// Where the schema migrations come from. Chosen once at startup and handed to
/// [`Database::migrate`](crate::Database::migrate).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Migrations {
    /// The migrations compiled into this crate.
    #[default]
    Embedded,
    /// SQL files read from a directory at runtime.
    Directory(PathBuf),
}

pub(crate) async fn run(pool: &SqlitePool, source: &Migrations) -> Result<()> {
    match source {
        Migrations::Embedded => {
            log::debug!("applying {} embedded migrations", EMBEDDED.iter().count());
            EMBEDDED.run(pool).await.context("error applying embedded migrations")
        }
        Migrations::Directory(path) => {
            log::debug!("loading migrations from {}", path.display());
            let migrator = Migrator::new(path.as_path())
                .await
                .with_context(|| format!("error loading migrations from {}", path.display()))?;
            migrator.run(pool).await.context("error applying migrations")
        }
    }
}
