//! Harvest orchestration: the per-feed convergence loop and the multi-feed
//! runner.

mod convergence;
mod dedup;
mod runner;
mod session;
mod stagnation;

use crate::browser::RenderError;

pub use convergence::Harvester;
pub use dedup::DedupStore;
pub use runner::harvest_all;
pub use session::{HarvestSession, SessionResult, SessionStatus};
pub use stagnation::{StagnationPolicy, Verdict};

/// Conditions that end a session early.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("blocked: {0}")]
    Blocked(&'static str),
    #[error("{source} (after {attempts} failed attempts)")]
    Exhausted { attempts: u32, source: RenderError },
    #[error("timeout")]
    TimedOut,
    #[error("cancelled")]
    Cancelled,
}

impl HarvestError {
    /// Terminal status this condition maps to.
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Blocked(_) => SessionStatus::Blocked,
            Self::Exhausted { .. } => SessionStatus::Failed,
            Self::TimedOut => SessionStatus::TimedOut,
            Self::Cancelled => SessionStatus::Cancelled,
        }
    }
}
