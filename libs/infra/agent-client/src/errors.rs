use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentClientError {
    #[error("network error talking to the coordinator: {0}")]
    Network(#[from] reqwest::Error),

    #[error("local file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message envelope: {0}")]
    Transport(#[from] krakenhashes_transport::TransportError),

    #[error("coordinator rejected the request: {0}")]
    Rejected(String),

    #[error("registration voucher was rejected")]
    Unauthorized,

    #[error("control channel closed by the coordinator")]
    ChannelClosed,

    #[error("file content hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch { path: String, expected: String, actual: String },

    #[error("file sync exhausted its retry budget for {path}")]
    SyncExhausted { path: String },
}
