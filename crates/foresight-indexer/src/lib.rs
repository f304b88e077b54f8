pub mod config;
pub mod decode;
pub mod engine;
pub mod fetch;
pub mod profiles;
pub mod replay;
pub mod snapshots;
pub mod task;
pub mod timestamps;

pub use config::IndexerConfig;
pub use decode::EventDecoder;
pub use engine::IngestionEngine;
pub use fetch::{FetchStep, RangeFetcher, SpanConfig};
pub use profiles::{LoggingProfileSink, ProfileSink};
pub use replay::{LogStore, ReplayLedger};
pub use task::IngestionTask;
pub use timestamps::TimestampResolver;
