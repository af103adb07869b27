use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// The filename is already bound to a metahash in the chain.
    #[error("filename already claimed: {0}")]
    DuplicateKey(String),

    /// The consensus engine task is gone.
    #[error("consensus engine stopped")]
    Stopped,
}
