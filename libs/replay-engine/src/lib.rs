pub mod config;
pub mod error;
pub mod record;
mod scheduler;

pub use config::{FractionMode, MalformedPolicy, PublishErrorPolicy, ReplayConfig};
pub use error::ReplayError;
pub use record::{MalformedReason, MalformedRecord, ParsedLine, parse_bytes, parse_line};
pub use scheduler::{ReplayEnd, ReplayReport, Scheduler};
