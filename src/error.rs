use std::fmt;

/// Main error type for the failure detector
#[derive(Debug)]
pub enum SwimError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Socket creation, binding or address resolution errors
    Transport(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Wire format errors
    Codec(CodecError),
}

/// Wire format errors
#[derive(Debug)]
pub enum CodecError {
    /// Outgoing message could not be encoded
    Encode(bincode::error::EncodeError),

    /// Incoming datagram could not be decoded
    Decode(DecodeError),
}

/// Why an incoming datagram was rejected
#[derive(Debug)]
pub enum DecodeError {
    /// Truncated record, unknown kind tag or invalid identifier bytes
    Malformed(bincode::error::DecodeError),

    /// Record decoded but bytes were left over
    TrailingBytes { consumed: usize, len: usize },

    /// A process identifier on the wire was empty
    EmptyIdentifier,
}

impl fmt::Display for SwimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwimError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SwimError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SwimError::Io(err) => write!(f, "I/O error: {}", err),
            SwimError::Codec(err) => write!(f, "Codec error: {}", err),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(err) => write!(f, "encode: {}", err),
            CodecError::Decode(err) => write!(f, "decode: {}", err),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(err) => write!(f, "malformed record: {}", err),
            DecodeError::TrailingBytes { consumed, len } => {
                write!(f, "{} trailing bytes after record", len - consumed)
            }
            DecodeError::EmptyIdentifier => write!(f, "empty process identifier"),
        }
    }
}

impl std::error::Error for SwimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SwimError::Io(err) => Some(err),
            SwimError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Encode(err) => Some(err),
            CodecError::Decode(err) => Some(err),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, SwimError>;

impl From<std::io::Error> for SwimError {
    fn from(err: std::io::Error) -> Self {
        SwimError::Io(err)
    }
}

impl From<bincode::error::EncodeError> for SwimError {
    fn from(err: bincode::error::EncodeError) -> Self {
        SwimError::Codec(CodecError::Encode(err))
    }
}

impl From<DecodeError> for SwimError {
    fn from(err: DecodeError) -> Self {
        SwimError::Codec(CodecError::Decode(err))
    }
}

impl From<bincode::error::DecodeError> for DecodeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        DecodeError::Malformed(err)
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::SwimError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SwimError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::SwimError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::SwimError::Transport(format!($fmt, $($arg)*))
    };
}
