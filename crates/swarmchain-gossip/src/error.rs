use thiserror::Error;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
}
