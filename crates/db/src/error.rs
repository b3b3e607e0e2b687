use model::Id;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No quiz with the requested identifier or slug exists.
    #[error("quiz not found")]
    QuizNotFound,
    /// No question with the requested identifier exists.
    #[error("question not found")]
    QuestionNotFound,
    /// The update matched no row. The quiz may have been deleted since it was loaded.
    #[error("no rows affected when updating quiz {0}")]
    QuizNotUpdated(Id),
    /// The update matched no row under the expected parent.
    #[error("no rows affected when updating question {0}")]
    QuestionNotUpdated(Id),
    /// The update matched no row under the expected parent.
    #[error("no rows affected when updating option {0}")]
    ChoiceNotUpdated(Id),
    /// Updates require an entity that has already been persisted.
    #[error("cannot update {0} with zero ID")]
    ZeroId(&'static str),
    /// A question cannot be created without naming the quiz that owns it.
    #[error("cannot create a question without an owning quiz")]
    MissingQuiz,
    /// A stored identifier or timestamp is out of range. This is a bug or a corrupt database.
    #[error("database returned an unrepresentable value")]
    InvalidId,
    #[error("{context}")]
    Context {
        context: Box<str>,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    /// Innermost error of a chain built with [`ResultExt`].
    pub fn root(&self) -> &Self {
        let mut err = self;
        while let Self::Context { source, .. } = err {
            err = source;
        }
        err
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::QuizNotFound | Self::QuestionNotFound)
    }

    /// Whether the request was rejected before touching the database.
    pub fn is_precondition(&self) -> bool {
        matches!(self.root(), Self::ZeroId(_) | Self::MissingQuiz)
    }

    fn wrap(self, context: Box<str>) -> Self {
        Self::Context { context, source: Box::new(self) }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Attaches operation context to errors as they unwind.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T>;
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<Box<str>>;
}

impl<T, E> ResultExt<T> for core::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|err| err.into().wrap(context.into()))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<Box<str>>,
    {
        self.map_err(|err| err.into().wrap(f().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn root_sees_through_context() {
        let id = Id::new(3).unwrap();
        let err = Err::<(), _>(Error::ChoiceNotUpdated(id))
            .context("error upserting option 3")
            .with_context(|| "error upserting question 1")
            .unwrap_err();

        assert!(matches!(err.root(), Error::ChoiceNotUpdated(got) if *got == id));
        assert_eq!(err.to_string(), "error upserting question 1");
        assert_eq!(err.source().unwrap().to_string(), "error upserting option 3");
        assert!(!err.is_not_found());
    }

    #[test]
    fn classifies_preconditions() {
        let err = Err::<(), _>(Error::ZeroId("quiz")).context("error updating quiz").unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(err.root().to_string(), "cannot update quiz with zero ID");
        assert!(Error::QuestionNotFound.is_not_found());
    }
}
