use db::Migrations;
use std::{env, path::PathBuf};

const DEFAULT_DATABASE_URL: &str = "sqlite://quizzo.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, PartialEq, Eq)]
pub struct Config {
    /// SQLite connection string, e.g. `sqlite://quizzo.db` or `sqlite::memory:`.
    pub database_url: String,
    pub max_connections: u32,
    pub migrations: Migrations,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        anyhow::ensure!(max_connections > 0, "DATABASE_MAX_CONNECTIONS must be positive");
        let migrations = match lookup("MIGRATIONS_DIR") {
            Some(dir) => Migrations::Directory(PathBuf::from(dir)),
            None => Migrations::Embedded,
        };
        Ok(Self { database_url, max_connections, migrations })
    }
}
