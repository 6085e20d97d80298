//! Automation rules: regex matches in task text become task links.
//!
//! - [`AutomationEngine`] evaluates a user's rules and remembers which ones
//!   already fired for a given text, so re-saving a task does not regenerate
//!   links.
//! - [`ExecutionCache`] holds those execution records; clear it per user
//!   whenever that user's rules change.
//! - [`merge_and_deduplicate_links`] folds existing, submitted and generated
//!   links into one ordered list.

mod cache;
mod engine;
mod merge;
mod template;

pub use cache::{DEFAULT_CACHE_CAPACITY, ExecutionCache};
pub use engine::{
    AutomationEngine, AutomationError, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_PATTERN_LEN,
    EngineLimits, GeneratedLinks, RuleSource, compile_rule,
};
pub use merge::merge_and_deduplicate_links;
pub use template::expand_template;
