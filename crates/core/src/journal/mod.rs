//! Append-only journal of pipeline activity.
//!
//! Events are emitted through a cheap cloneable [`JournalHandle`] and
//! persisted by a background [`JournalWriter`], so emission never blocks or
//! fails the pipeline.

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
pub use writer::*;
