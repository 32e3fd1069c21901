//! In-process tiers that sit beside the remote store.

pub mod fallback;
pub mod predictive;

pub use fallback::FallbackStore;
pub use predictive::{PredictiveEntry, PredictiveStore};

/// Which tier accepted a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Remote,
    Fallback,
}
