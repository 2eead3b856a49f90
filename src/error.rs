//! Error types for the SchemaBit codec

/// Errors that can occur during schema inference, encoding, decoding or
/// class registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Value kind that cannot be serialized (functions)
    #[error("unsupported value: {0}")]
    UnsupportedValue(&'static str),
    /// Value does not fit the schema it is being encoded with
    #[error("value does not match schema: expected {expected}, found {found}")]
    TypeMismatch {
        /// Schema kind the dispatcher expected
        expected: &'static str,
        /// Kind of the value actually supplied
        found: &'static str,
    },
    /// Corrupt or version-mismatched wire data
    #[error("unknown schema byte 0x{byte:02x} at position {position}")]
    UnknownSchemaByte {
        /// Offending byte
        byte: u8,
        /// Stream offset of the offending byte
        position: usize,
    },
    /// Schema node with no compiler rule (dangling recall slot)
    #[error("unknown dispatcher: {0}")]
    UnknownDispatcher(String),
    /// Class name already bound to a different constructor
    #[error("class {0:?} is already registered with a different constructor")]
    DuplicateRegistration(String),
    /// Instance of a class that is not present in the registry
    #[error("class {0:?} is not registered")]
    UnknownClass(String),
    /// Schema shape that cannot be used where it was supplied
    #[error("unsupported schema: {0}")]
    UnsupportedSchema(&'static str),
    /// Read past the end of the input
    #[error("read of {needed} bytes at position {position} runs past end of input ({len} bytes)")]
    OutOfBounds {
        /// Cursor position at the failed read
        position: usize,
        /// Number of bytes requested
        needed: usize,
        /// Total input length
        len: usize,
    },
    /// Fixed output buffer too small
    #[error("output buffer too small")]
    ShortBuffer,
    /// Back-reference to an object or string that was never recorded
    #[error("invalid back-reference {index} at position {position}")]
    InvalidReference {
        /// Referenced memory index
        index: u64,
        /// Stream offset of the reference
        position: usize,
    },
    /// Malformed UTF-8 string payload
    #[error("invalid UTF-8 in string at position {position}")]
    InvalidUtf8 {
        /// Stream offset of the start of the string
        position: usize,
    },
    /// Varint that overflows its target width
    #[error("invalid varint at position {position}")]
    InvalidVarint {
        /// Stream offset of the start of the varint
        position: usize,
    },
    /// Value or schema nested deeper than the configured limit
    #[error("nesting depth exceeds limit of {0}")]
    DepthLimit(usize),
    /// Input continues after a complete value
    #[error("{remaining} trailing bytes after value at position {position}")]
    TrailingBytes {
        /// Offset where the value ended
        position: usize,
        /// Bytes left unread
        remaining: usize,
    },
}

/// Result type alias for SchemaBit operations
pub type Result<T> = core::result::Result<T, Error>;
