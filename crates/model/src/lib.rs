#![no_std]
extern crate alloc;

pub mod quiz;
pub mod validate;

pub use chrono::{DateTime, Utc};
pub use quiz::{Choice, Question, Quiz};
pub use validate::Problems;

/// Server-assigned row identifier. An absent identifier marks an entity that has not been
/// persisted yet.
pub type Id = core::num::NonZeroI64;
