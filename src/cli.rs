use crate::config::Config;
use clap::{Parser, Subcommand};
use db::{Database, Id, Question, Quiz};
use model::{validate, Problems};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Administrative front end for the quiz store.
#[derive(Debug, Parser)]
#[command(name = "quizzo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Check that the database is reachable.
    Ping,
    /// Print every quiz with its questions and options.
    List,
    /// Print one quiz, by identifier or by slug.
    Show {
        #[arg(required_unless_present = "slug", conflicts_with = "slug")]
        id: Option<Id>,
        #[arg(long)]
        slug: Option<String>,
    },
    /// Print one question with its options.
    Question { id: Id },
    /// Create a quiz from a JSON document. Identifiers in the document are ignored.
    Create { file: PathBuf },
    /// Make the stored quiz match a JSON document. The document must carry the quiz `id`.
    Update { file: PathBuf },
    /// Add a question from a JSON document to an existing quiz.
    AddQuestion { quiz: Id, file: PathBuf },
    /// Make the stored question match a JSON document carrying its `id`.
    EditQuestion { file: PathBuf },
}

pub async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database_url, config.max_connections).await?;
    db.migrate(&config.migrations).await?;
    log::info!("connected to {}", config.database_url);

    match command {
        Command::Migrate => Ok(()),
        Command::Ping => Ok(db.ping().await?),
        Command::List => print(&db.list_quizzes().await?),
        Command::Show { id: Some(id), .. } => print(&db.get_quiz(id).await?),
        Command::Show { slug: Some(slug), .. } => print(&db.get_quiz_by_slug(&slug).await?),
        Command::Show { .. } => anyhow::bail!("either a quiz id or --slug is required"),
        Command::Question { id } => print(&db.get_question(id).await?),
        Command::Create { file } => {
            let mut quiz: Quiz = read(&file)?;
            check(validate::quiz(&quiz))?;
            db.create_quiz(&mut quiz).await?;
            print(&quiz)
        }
        Command::Update { file } => {
            let mut quiz: Quiz = read(&file)?;
            check(validate::quiz(&quiz))?;
            db.update_quiz(&mut quiz).await?;
            print(&quiz)
        }
        Command::AddQuestion { quiz, file } => {
            let mut question: Question = read(&file)?;
            check(validate::question(&question))?;
            question.quiz_id = Some(quiz);
            db.create_question(&mut question).await?;
            print(&question)
        }
        Command::EditQuestion { file } => {
            let mut question: Question = read(&file)?;
            check(validate::question(&question))?;
            db.update_question(&mut question).await?;
            print(&question)
        }
    }
}

fn read<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout().lock();
    serde_json::to_writer_pretty(stdout, value)?;
    println!();
    Ok(())
}

fn check(problems: Problems) -> anyhow::Result<()> {
    if problems.is_empty() {
        return Ok(());
    }
    for (field, problem) in &problems {
        eprintln!("{field}: {problem}");
    }
    anyhow::bail!("refusing to save: {} validation problems", problems.len())
}
