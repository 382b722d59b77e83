use replay_api::PublishError;

#[derive(Debug, thiserror::Error)]
pub enum MqttReplayError {
    #[error("{0}")]
    Config(String),

    #[error("broker: {0}")]
    Connect(#[from] PublishError),

    #[error("cannot open input {path}: {source}")]
    Input { path: String, source: std::io::Error },

    #[error("{0}")]
    Replay(#[from] replay_engine::ReplayError),
}
