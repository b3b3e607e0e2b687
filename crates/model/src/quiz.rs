use crate::Id;
use alloc::{string::String, vec::Vec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The aggregate root: a quiz together with every question and choice it owns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quiz {
    /// Assigned by the store on creation.
    #[serde(default)]
    pub id: Option<Id>,
    pub title: String,
    /// URL-friendly name. Must be unique across all quizzes.
    pub slug: String,
    pub description: String,
    /// Set by the store when the quiz is first persisted.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    #[serde(default)]
    pub id: Option<Id>,
    /// Owning quiz. The store always overwrites this with the actual parent.
    #[serde(default)]
    pub quiz_id: Option<Id>,
    /// Question to be displayed to the players.
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Caller-defined ordering key. Neither uniqueness nor contiguity is checked.
    #[serde(default)]
    pub position: i64,
    /// Possible answers to select from.
    #[serde(default)]
    pub options: Vec<Choice>,
}

/// A single answer option of a [`Question`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Choice {
    #[serde(default)]
    pub id: Option<Id>,
    /// Owning question. The store always overwrites this with the actual parent.
    #[serde(default)]
    pub question_id: Option<Id>,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl Quiz {
    /// Forgets every identifier in the aggregate so that persisting it yields fresh rows.
    pub fn clear_ids(&mut self) {
        self.id = None;
        for question in &mut self.questions {
            question.clear_ids();
        }
    }
}

impl Question {
    /// Forgets the identifiers of this question and of all of its options.
    pub fn clear_ids(&mut self) {
        self.id = None;
        self.clear_option_ids();
    }

    pub fn clear_option_ids(&mut self) {
        for option in &mut self.options {
            option.id = None;
            option.question_id = None;
        }
    }
}
