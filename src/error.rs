use thiserror::Error;

/// Errors surfaced to callers of [`crate::config::SimConfig`] and
/// [`crate::network`]. Per-event conditions (invalid block, unknown parent,
/// duplicate message, stale mining event) are not represented here: the
/// specification treats them as silent, non-fatal drops, observable only
/// through `log::debug!`/`log::trace!` at the call site that drops them.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
