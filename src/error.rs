//! Main Crate Error

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Lodestone crate error enum.
pub enum Error {
    /// Returned when building a [Key](crate::Key) from a byte string of
    /// the wrong width.
    #[error("Invalid key size: {0} bytes")]
    InvalidKeySize(usize),

    /// Returned when parsing a [Key](crate::Key) from a malformed hex
    /// string.
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The endpoint has no address for this peer and cannot dial it.
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// The per-request deadline elapsed before a response arrived.
    #[error("Request timed out")]
    Timeout,

    /// The message received in reply to a request is not a valid
    /// response message.
    #[error("Received message is not a valid response")]
    InvalidResponseType,
}
