use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed packet: more than one variant populated")]
    MalformedPacket,

    #[error("Unsupported packet: no variant populated")]
    EmptyPacket,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
