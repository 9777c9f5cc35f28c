use std::fmt;

/// The distinguishable error kinds surfaced at the public boundary of the core:
/// callers match on these instead of parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Encoder refused parameters before doing any work: `n > OFEC_MAX` or `N1 < 3`.
    CodecParams,
    /// Decoder could not recover the message: no valid OTI, or decoding never completed.
    DecodeFailure,
    /// Receive loop terminated on an I/O error from the capture transport.
    Capture,
    /// Transmit loop terminated on an I/O error from the injection transport.
    Transmit,
    /// Radiotap iteration hit a malformed header it could not safely continue past.
    MalformedRadiotap,
    /// Anything else, generally propagated from a caller-supplied `Read`/`Write`.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::CodecParams => "codec parameters",
            ErrorKind::DecodeFailure => "decode failure",
            ErrorKind::Capture => "capture",
            ErrorKind::Transmit => "transmit",
            ErrorKind::MalformedRadiotap => "malformed radiotap",
            ErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// Crate-wide error type. Wraps an [`std::io::Error`], tagged with an [`ErrorKind`].
#[derive(Debug)]
pub struct CoreError {
    kind: ErrorKind,
    inner: std::io::Error,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Build a new error of the given kind, logging it at construction time.
    pub fn new<E>(kind: ErrorKind, msg: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>> + std::fmt::Debug,
    {
        log::error!("{}: {:?}", kind, msg);
        CoreError {
            kind,
            inner: std::io::Error::new(std::io::ErrorKind::Other, msg),
        }
    }

    /// The distinguishable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.inner)
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        log::error!("{:?}", err);
        CoreError {
            kind: ErrorKind::Io,
            inner: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_preserved_through_display() {
        let err = CoreError::new(ErrorKind::CodecParams, "n exceeds OFEC_MAX");
        assert_eq!(err.kind(), ErrorKind::CodecParams);
        assert!(err.to_string().contains("codec parameters"));
    }

    #[test]
    fn io_error_converts_with_io_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: CoreError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
