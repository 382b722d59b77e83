pub mod config;
pub mod error;
pub mod publisher;
pub mod replay;
