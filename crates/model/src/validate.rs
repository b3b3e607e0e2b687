//! Structural checks run by callers before handing an aggregate to the store. The store
//! itself never validates: it only reconciles.

use crate::{Choice, Question, Quiz};
use alloc::{collections::BTreeMap, format, string::String};

/// Field path (e.g. `questions[0].options[1].text`) mapped to a description of what is wrong.
pub type Problems = BTreeMap<String, &'static str>;

const REQUIRED: &str = "must not be empty";
const NO_OPTIONS: &str = "must have at least one option";

/// Collects every structural problem of the quiz and its descendants.
pub fn quiz(quiz: &Quiz) -> Problems {
    let mut problems = Problems::new();
    if is_blank(&quiz.title) {
        problems.insert("title".into(), REQUIRED);
    }
    if is_blank(&quiz.slug) {
        problems.insert("slug".into(), REQUIRED);
    }
    if is_blank(&quiz.description) {
        problems.insert("description".into(), REQUIRED);
    }
    for (i, q) in quiz.questions.iter().enumerate() {
        collect_question(&mut problems, &format!("questions[{i}]."), q);
    }
    problems
}

/// Same as [`quiz`] but rooted at a single question. Paths carry no prefix.
pub fn question(question: &Question) -> Problems {
    let mut problems = Problems::new();
    collect_question(&mut problems, "", question);
    problems
}

fn collect_question(problems: &mut Problems, prefix: &str, question: &Question) {
    if is_blank(&question.text) {
        problems.insert(format!("{prefix}text"), REQUIRED);
    }
    if question.options.is_empty() {
        problems.insert(format!("{prefix}options"), NO_OPTIONS);
    }
    for (i, option) in question.options.iter().enumerate() {
        collect_choice(problems, &format!("{prefix}options[{i}]."), option);
    }
}

fn collect_choice(problems: &mut Problems, prefix: &str, choice: &Choice) {
    if is_blank(&choice.text) {
        problems.insert(format!("{prefix}text"), REQUIRED);
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
