use replay_api::PublishError;

use crate::record::MalformedRecord;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("line {line_no}: {source}")]
    Malformed { line_no: u64, source: MalformedRecord },

    #[error("publish '{payload}' on '{topic}': {source}")]
    Publish { topic: String, payload: String, source: PublishError },

    #[error("input: {0}")]
    Input(#[from] std::io::Error),
}
