/// Why a name string failed to validate as one of the D-Bus name kinds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid bus name: {0}")]
    InvalidBusName(String),

    #[error("invalid unique name: {0}")]
    InvalidUniqueName(String),

    #[error("invalid well-known name: {0}")]
    InvalidWellKnownName(String),

    #[error("invalid interface name: {0}")]
    InvalidInterfaceName(String),

    #[error("invalid member name: {0}")]
    InvalidMemberName(String),

    #[error("invalid error name: {0}")]
    InvalidErrorName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
