/// The codec-level error taxonomy.
///
/// Each variant is its own stable kind; callers match on the variant rather than parsing a
/// message string.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A signature string contained an unrecognized type code, or was truncated mid-container.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// A signature string was longer than the 255-byte wire limit.
    #[error("signature too long: {0} bytes")]
    SignatureTooLong(usize),

    /// An object path failed `/` or `/seg(/seg)*` validation.
    #[error("invalid object path: {0}")]
    ObjectPathInvalid(String),

    /// A value was asked to align to a boundary it could not reach within the buffer.
    #[error("alignment error: expected boundary of {0}")]
    Alignment(usize),

    /// The input buffer ended before a value could be fully read.
    #[error("not enough data in buffer: needed {needed}, had {available}")]
    ReadBuffer { needed: usize, available: usize },

    /// A value did not match the shape required by its signature (e.g. a mapping with
    /// non-unique keys, or a struct signature with zero fields).
    #[error("invalid value for signature: {0}")]
    InvalidValue(String),

    /// A boolean was decoded from a 32-bit wire value other than 0 or 1.
    #[error("invalid boolean wire value: {0}")]
    InvalidBoolean(u32),

    /// A string value was not valid UTF-8.
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    /// A string-like value (string, signature) was missing its terminating NUL.
    #[error("missing NUL terminator")]
    MissingNul,
}

pub type Result<T> = std::result::Result<T, Error>;
