//! Search, enrichment and filtering of channel candidates for one keyword.

mod enrich;
mod filters;
mod search;
mod types;

pub use enrich::{EnrichmentPipeline, EnrichmentReport};
pub use filters::{is_short_form, script_ranges, summarize_sample, ChannelFilters};
pub use search::{SearchOutcome, SearchStage};
pub use types::*;
