use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeySpaceError {
    #[error("Invalid key count: count must be greater than 0")]
    Empty,

    #[error("Invalid decimal modulus: modulus must be greater than 0")]
    ZeroModulus,

    #[error("Unknown key mode: {0}")]
    UnknownMode(String),
}
