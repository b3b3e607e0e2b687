pub mod error;
pub mod migrate;

mod reader;
mod reconcile;
mod tx;
mod upsert;

use core::str::FromStr;
use error::{Error, Result, ResultExt};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Connection, SqlitePool,
};
use upsert::Mode;

pub use migrate::Migrations;
pub use model::{Choice, Id, Question, Quiz};

/// Quiz store backed by a SQLite connection pool. Every write runs in its own transaction:
/// either the whole aggregate lands or nothing does.
pub struct Database {
    pool: SqlitePool,
}

impl From<SqlitePool> for Database {
    fn from(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl Database {
    /// Opens (and creates, if missing) the database at `url` with foreign keys enforced.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database URL {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("error connecting to database")?;
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await.context("error pinging database")
    }

    pub async fn migrate(&self, source: &Migrations) -> Result<()> {
        migrate::run(&self.pool, source).await
    }

    pub async fn list_quizzes(&self) -> Result<Vec<Quiz>> {
        let mut conn = self.pool.acquire().await?;
        reader::all_quizzes(&mut conn).await.context("error listing quizzes")
    }

    pub async fn get_quiz(&self, id: Id) -> Result<Quiz> {
        let mut conn = self.pool.acquire().await?;
        reader::quiz_by_id(&mut conn, id).await
    }

    pub async fn get_quiz_by_slug(&self, slug: &str) -> Result<Quiz> {
        let mut conn = self.pool.acquire().await?;
        reader::quiz_by_slug(&mut conn, slug).await
    }

    /// Persists the quiz as a brand new aggregate. Any identifiers already present are
    /// discarded; on success the aggregate carries the freshly assigned ones.
    pub async fn create_quiz(&self, quiz: &mut Quiz) -> Result<()> {
        let mut tx = tx::begin(&self.pool).await?;
        let result = upsert::upsert_quiz(&mut tx, quiz, Mode::Create).await;
        let id = tx::finish(tx, result).await.context("error creating quiz")?;
        log::info!("created quiz {id} with {} questions", quiz.questions.len());
        Ok(())
    }

    /// Makes the stored quiz match the aggregate exactly. Questions and options that are no
    /// longer listed are deleted.
    pub async fn update_quiz(&self, quiz: &mut Quiz) -> Result<()> {
        let id = quiz.id.ok_or(Error::ZeroId("quiz"))?;
        let mut tx = tx::begin(&self.pool).await?;
        let result = upsert::upsert_quiz(&mut tx, quiz, Mode::Update(id)).await;
        tx::finish(tx, result).await.context("error saving quiz")?;
        log::info!("updated quiz {id}");
        Ok(())
    }

    pub async fn get_question(&self, id: Id) -> Result<Question> {
        let mut conn = self.pool.acquire().await?;
        reader::question_by_id(&mut conn, id).await
    }

    /// Adds the question to the quiz named by its `quiz_id`.
    pub async fn create_question(&self, question: &mut Question) -> Result<()> {
        let quiz = question.quiz_id.ok_or(Error::MissingQuiz)?;
        question.clear_ids();
        let mut tx = tx::begin(&self.pool).await?;
        let result = upsert::insert_question(&mut tx, question, quiz).await;
        let id = tx::finish(tx, result).await.context("error creating question")?;
        log::info!("created question {id} in quiz {quiz}");
        Ok(())
    }

    pub async fn update_question(&self, question: &mut Question) -> Result<()> {
        let id = question.id.ok_or(Error::ZeroId("question"))?;
        let mut tx = tx::begin(&self.pool).await?;
        let result = upsert::update_question(&mut tx, question, id).await;
        tx::finish(tx, result).await.context("error saving question")?;
        log::info!("updated question {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{error::Error, Choice, Database, Id, Migrations, Question, Quiz};
    use core::str::FromStr;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn memory() -> Database {
        // A single long-lived connection: every new in-memory connection is a new database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap().foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        let db = Database::from(pool);
        db.migrate(&Migrations::Embedded).await.unwrap();
        db
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(&db.pool).await.unwrap()
    }

    fn choice(text: &str, correct: bool) -> Choice {
        Choice { text: text.into(), correct, ..Default::default() }
    }

    fn question(text: &str, position: i64, options: Vec<Choice>) -> Question {
        Question { text: text.into(), position, options, ..Default::default() }
    }

    fn quiz(slug: &str, questions: Vec<Question>) -> Quiz {
        Quiz {
            title: "Quiz 1".into(),
            slug: slug.into(),
            description: "d".into(),
            questions,
            ..Default::default()
        }
    }

    /// Two questions with four options each.
    fn planets() -> Quiz {
        let options = |prefix: &str| -> Vec<Choice> { (1..=4).map(|i| choice(&format!("{prefix}{i}"), i == 1)).collect() };
        quiz("planets", vec![question("Q1", 1, options("a")), question("Q2", 2, options("b"))])
    }

    /// Drops every server-assigned value so aggregates can be compared by content.
    fn content(mut quiz: Quiz) -> Quiz {
        quiz.clear_ids();
        quiz.created_at = None;
        for question in &mut quiz.questions {
            question.quiz_id = None;
        }
        quiz
    }

    fn texts(question: &Question) -> Vec<&str> {
        question.options.iter().map(|option| option.text.as_str()).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn creates_and_reads_back_aggregate() {
        let db = memory().await;
        db.ping().await.unwrap();

        let mut created = quiz("quiz-1", vec![question("Q1", 10, vec![choice("A", false), choice("B", true)])]);
        let desired = created.clone();
        db.create_quiz(&mut created).await.unwrap();

        let id = created.id.unwrap();
        let fetched = db.get_quiz(id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(content(fetched.clone()), desired);

        let question = &fetched.questions[0];
        assert_eq!(question.quiz_id, Some(id));
        assert_eq!(question.position, 10);
        assert!(question.id.is_some());
        for option in &question.options {
            assert!(option.id.is_some());
            assert_eq!(option.question_id, question.id);
        }

        let age = chrono::Utc::now() - fetched.created_at.unwrap();
        assert!(age.num_seconds().abs() < 5);

        assert_eq!(db.get_quiz_by_slug("quiz-1").await.unwrap(), fetched);
        assert_eq!(db.list_quizzes().await.unwrap(), vec![fetched]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_rows_are_not_found() {
        let db = memory().await;
        let id = Id::new(42).unwrap();
        assert!(matches!(db.get_quiz(id).await, Err(Error::QuizNotFound)));
        assert!(matches!(db.get_quiz_by_slug("nope").await, Err(Error::QuizNotFound)));
        assert!(matches!(db.get_question(id).await, Err(Error::QuestionNotFound)));
        assert!(db.list_quizzes().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn creation_never_reuses_supplied_ids() {
        let db = memory().await;
        let mut first = planets();
        db.create_quiz(&mut first).await.unwrap();

        // Resubmitting a persisted aggregate as new must copy it, not touch the original.
        let mut copy = first.clone();
        copy.slug = "planets-copy".into();
        copy.questions[0].text = "changed".into();
        db.create_quiz(&mut copy).await.unwrap();

        assert_ne!(copy.id, first.id);
        for (old, new) in first.questions.iter().zip(&copy.questions) {
            assert_ne!(old.id, new.id);
            assert_eq!(new.quiz_id, copy.id);
            for (old, new) in old.options.iter().zip(&new.options) {
                assert_ne!(old.id, new.id);
            }
        }
        assert_eq!(db.get_quiz(first.id.unwrap()).await.unwrap(), first);

        // Identifiers that were never assigned are not honored either.
        let bogus = Id::new(9000);
        let mut forged = quiz("forged", vec![question("Q", 0, vec![choice("A", true)])]);
        forged.id = bogus;
        forged.questions[0].id = bogus;
        forged.questions[0].options[0].id = bogus;
        db.create_quiz(&mut forged).await.unwrap();
        assert_ne!(forged.id, bogus);
        assert_ne!(forged.questions[0].id, bogus);
        assert_ne!(forged.questions[0].options[0].id, bogus);
        assert_eq!(count(&db, "quizzes").await, 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_reconciles_children() {
        let db = memory().await;
        let mut stored = planets();
        db.create_quiz(&mut stored).await.unwrap();
        let dropped = stored.questions[1].clone();
        let kept_option = stored.questions[0].options[0].id;

        let mut desired = stored.clone();
        desired.title = "Renamed".into();
        desired.questions.truncate(1);
        let q1 = &mut desired.questions[0];
        q1.options.remove(2);
        q1.options[1].text = "a2 edited".into();
        q1.options.push(choice("a5", false));
        db.update_quiz(&mut desired).await.unwrap();

        let fetched = db.get_quiz(stored.id.unwrap()).await.unwrap();
        assert_eq!(fetched, desired);
        assert_eq!(fetched.title, "Renamed");
        assert_eq!(fetched.created_at, stored.created_at);
        assert_eq!(fetched.questions.len(), 1);
        assert_eq!(fetched.questions[0].id, stored.questions[0].id);
        assert_eq!(texts(&fetched.questions[0]), ["a1", "a2 edited", "a4", "a5"]);
        assert_eq!(fetched.questions[0].options[0].id, kept_option);

        // The dropped question and its options are gone from storage.
        assert!(matches!(db.get_question(dropped.id.unwrap()).await, Err(Error::QuestionNotFound)));
        assert_eq!(count(&db, "questions").await, 1);
        assert_eq!(count(&db, "options").await, 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn new_questions_get_fresh_options() {
        let db = memory().await;
        let mut stored = planets();
        db.create_quiz(&mut stored).await.unwrap();

        // A new question that borrows option ids from an existing one must not steal them.
        let mut desired = stored.clone();
        let mut borrowed = desired.questions[0].clone();
        borrowed.id = None;
        borrowed.text = "Q3".into();
        borrowed.position = 3;
        desired.questions.push(borrowed);
        db.update_quiz(&mut desired).await.unwrap();

        let fetched = db.get_quiz(stored.id.unwrap()).await.unwrap();
        assert_eq!(fetched.questions.len(), 3);
        assert_eq!(fetched.questions[0], stored.questions[0]);
        let q3 = &fetched.questions[2];
        assert_eq!(texts(q3), ["a1", "a2", "a3", "a4"]);
        for (old, new) in stored.questions[0].options.iter().zip(&q3.options) {
            assert_ne!(old.id, new.id);
        }
        assert_eq!(count(&db, "options").await, 12);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn updating_missing_rows_fails() {
        let db = memory().await;
        let mut stored = planets();
        db.create_quiz(&mut stored).await.unwrap();
        let before = db.get_quiz(stored.id.unwrap()).await.unwrap();
        let ghost = Id::new(9000).unwrap();

        let mut missing = planets();
        missing.id = Some(ghost);
        let err = db.update_quiz(&mut missing).await.unwrap_err();
        assert!(matches!(err.root(), Error::QuizNotUpdated(id) if *id == ghost));

        let mut desired = before.clone();
        desired.title = "should not stick".into();
        desired.questions[1].id = Some(ghost);
        let err = db.update_quiz(&mut desired).await.unwrap_err();
        assert!(matches!(err.root(), Error::QuestionNotUpdated(id) if *id == ghost));

        let mut desired = before.clone();
        desired.title = "should not stick".into();
        desired.questions[0].options[3].id = Some(ghost);
        let err = db.update_quiz(&mut desired).await.unwrap_err();
        assert!(matches!(err.root(), Error::ChoiceNotUpdated(id) if *id == ghost));

        assert_eq!(db.get_quiz(stored.id.unwrap()).await.unwrap(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cannot_claim_rows_of_another_quiz() {
        let db = memory().await;
        let mut victim = planets();
        db.create_quiz(&mut victim).await.unwrap();
        let mut thief = quiz("thief", vec![question("Q", 0, vec![choice("A", true)])]);
        db.create_quiz(&mut thief).await.unwrap();

        let stolen = victim.questions[0].clone();
        let stolen_id = stolen.id.unwrap();
        thief.questions.push(stolen);
        let err = db.update_quiz(&mut thief).await.unwrap_err();
        assert!(matches!(err.root(), Error::QuestionNotUpdated(id) if *id == stolen_id));
        assert_eq!(db.get_quiz(victim.id.unwrap()).await.unwrap(), victim);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_requires_persisted_quiz() {
        let db = memory().await;
        let err = db.update_quiz(&mut planets()).await.unwrap_err();
        assert!(matches!(err, Error::ZeroId("quiz")));
        assert!(err.is_precondition());
        assert_eq!(count(&db, "quizzes").await, 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_writes_roll_back_everything() {
        let db = memory().await;
        sqlx::query(
            "CREATE TRIGGER forced_failure BEFORE INSERT ON options WHEN NEW.text = 'boom' \
             BEGIN SELECT RAISE(ABORT, 'forced failure'); END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let mut doomed = planets();
        doomed.questions[1].options.push(choice("boom", false));
        let err = db.create_quiz(&mut doomed).await.unwrap_err();
        assert!(matches!(err.root(), Error::Database(_)));
        // The aggregate may carry ids that were never committed.
        assert!(doomed.id.is_some());
        assert_eq!(count(&db, "quizzes").await, 0);
        assert_eq!(count(&db, "questions").await, 0);
        assert_eq!(count(&db, "options").await, 0);

        let mut stored = planets();
        db.create_quiz(&mut stored).await.unwrap();
        let mut desired = stored.clone();
        desired.title = "Renamed".into();
        desired.questions.remove(0);
        desired.questions.push(question("Q3", 3, vec![choice("fine", true), choice("boom", false)]));
        assert!(db.update_quiz(&mut desired).await.is_err());
        assert_eq!(db.get_quiz(stored.id.unwrap()).await.unwrap(), stored);
        assert_eq!(count(&db, "options").await, 8);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn duplicate_slug_passes_through() {
        let db = memory().await;
        db.create_quiz(&mut planets()).await.unwrap();
        let err = db.create_quiz(&mut planets()).await.unwrap_err();
        assert!(matches!(err.root(), Error::Database(sqlx::Error::Database(_))));
        assert!(!err.is_not_found());
        assert_eq!(count(&db, "quizzes").await, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn question_entry_points() {
        let db = memory().await;
        let mut first = planets();
        db.create_quiz(&mut first).await.unwrap();
        let mut second = quiz("second", Vec::new());
        db.create_quiz(&mut second).await.unwrap();

        let mut added = question("Added", 5, vec![choice("yes", true), choice("no", false)]);
        added.id = first.questions[0].id;
        added.quiz_id = second.id;
        db.create_question(&mut added).await.unwrap();
        assert_ne!(added.id, first.questions[0].id);
        assert_eq!(db.get_question(added.id.unwrap()).await.unwrap(), added);
        assert_eq!(db.get_quiz(second.id.unwrap()).await.unwrap().questions, vec![added.clone()]);

        // The owner always comes from storage, never from the caller.
        let mut edited = added.clone();
        edited.quiz_id = first.id;
        edited.text = "Edited".into();
        edited.options.remove(1);
        edited.options.push(choice("maybe", false));
        db.update_question(&mut edited).await.unwrap();
        assert_eq!(edited.quiz_id, second.id);
        let fetched = db.get_question(added.id.unwrap()).await.unwrap();
        assert_eq!(fetched, edited);
        assert_eq!(texts(&fetched), ["yes", "maybe"]);
        assert_eq!(db.get_quiz(first.id.unwrap()).await.unwrap(), first);

        let err = db.create_question(&mut question("Orphan", 0, Vec::new())).await.unwrap_err();
        assert!(matches!(err, Error::MissingQuiz));

        let mut orphan = question("Orphan", 0, vec![choice("A", true)]);
        orphan.quiz_id = Id::new(9000);
        let err = db.create_question(&mut orphan).await.unwrap_err();
        assert!(matches!(err.root(), Error::Database(_)));

        let err = db.update_question(&mut question("New", 0, Vec::new())).await.unwrap_err();
        assert!(matches!(err, Error::ZeroId("question")));

        let mut ghost = question("Ghost", 0, Vec::new());
        ghost.id = Id::new(9000);
        let err = db.update_question(&mut ghost).await.unwrap_err();
        assert!(matches!(err.root(), Error::QuestionNotUpdated(_)));
        assert_eq!(count(&db, "questions").await, 3);
    }
}
