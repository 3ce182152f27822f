//! reviewharvest - incremental harvester for infinite-scroll review feeds.
//!
//! Drives a remote-rendered feed through a scroll/expand convergence loop,
//! extracts review records from each structural snapshot, deduplicates them
//! by fingerprint and persists the net-new ones after every iteration.

pub mod browser;
pub mod config;
pub mod detect;
pub mod extract;
pub mod harvest;
pub mod models;
pub mod schema;
pub mod sink;

pub use browser::{DriverFactory, RenderDriver, RenderError, Snapshot};
pub use config::HarvestConfig;
pub use harvest::{harvest_all, Harvester, SessionResult, SessionStatus};
pub use models::{CandidateRecord, FeedDescriptor};
pub use sink::{MemorySink, RecordSink, SinkError, SqliteSink};
