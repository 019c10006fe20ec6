//! Keyword queue read from the external keyword partition.

mod queue;
mod types;

pub use queue::KeywordQueue;
pub use types::{Keyword, KeywordStatus};
