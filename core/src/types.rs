use std::io;
use thiserror::Error;

use crate::{archive::ArchiveError, config::ConfigError, crypto::CryptoError};

/// Unified stream error covering the envelope, chunk codec, archive and I/O layers.
/// - `From<T>` impls enable `?` across the pipeline.
/// - `AuthenticationFailed` never says whether the key or the password was wrong.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Fewer header bytes than the header length field promises.
    #[error("truncated header: have {have} bytes, need {need}")]
    TruncatedHeader { have: usize, need: usize },

    /// Fewer body bytes than a structural field promises.
    #[error("truncated stream: {0}")]
    TruncatedStream(String),

    /// Bad magic, unknown flag bits or an inconsistent header.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// AEAD tag mismatch: wrong password, wrong key or corrupted data.
    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    /// Envelope is password protected but no password was supplied.
    #[error("password required")]
    PasswordRequired,

    /// KDF parameters beyond the configured safety caps.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The user-facing key token is malformed.
    #[error("invalid key token: {0}")]
    InvalidKeyToken(String),

    /// Cryptographic misuse other than authentication failure.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline wiring failure (channel closed, worker gone).
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Generic validation with a descriptive message.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl StreamError {
    /// True for the errors a caller answers by prompting for (another) password.
    pub fn requires_password_prompt(&self) -> bool {
        matches!(self, StreamError::PasswordRequired | StreamError::AuthenticationFailed)
    }

    /// Same error class, for replaying a terminal failure on later reads.
    /// Wrapped sub-errors that cannot be cloned keep their message only.
    pub(crate) fn duplicate(&self) -> StreamError {
        match self {
            StreamError::TruncatedHeader { have, need } => StreamError::TruncatedHeader { have: *have, need: *need },
            StreamError::TruncatedStream(m) => StreamError::TruncatedStream(m.clone()),
            StreamError::UnsupportedFormat(m) => StreamError::UnsupportedFormat(m.clone()),
            StreamError::AuthenticationFailed => StreamError::AuthenticationFailed,
            StreamError::PasswordRequired => StreamError::PasswordRequired,
            StreamError::ResourceExhausted(m) => StreamError::ResourceExhausted(m.clone()),
            StreamError::InvalidKeyToken(m) => StreamError::InvalidKeyToken(m.clone()),
            StreamError::Pipeline(m) => StreamError::Pipeline(m.clone()),
            StreamError::Validation(m) => StreamError::Validation(m.clone()),
            StreamError::Io(e) => StreamError::Io(io::Error::new(e.kind(), e.to_string())),
            other => StreamError::Pipeline(other.to_string()),
        }
    }

    /// Wrap into an `io::Error` for `Read` adapters; `From<io::Error>` undoes this.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            StreamError::TruncatedHeader { .. } | StreamError::TruncatedStream(_) => {
                io::ErrorKind::UnexpectedEof
            }
            StreamError::AuthenticationFailed
            | StreamError::UnsupportedFormat(_)
            | StreamError::Validation(_) => io::ErrorKind::InvalidData,
            StreamError::PasswordRequired | StreamError::InvalidKeyToken(_) => {
                io::ErrorKind::PermissionDenied
            }
            _ => io::ErrorKind::Other,
        };
        match self {
            StreamError::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        // Errors raised by our own Read adapters carry the original variant.
        if e.get_ref().is_some_and(|inner| inner.is::<StreamError>()) {
            if let Some(Ok(inner)) = e.into_inner().map(|inner| inner.downcast::<StreamError>()) {
                return *inner;
            }
            return StreamError::Pipeline("wrapped stream error lost".into());
        }
        StreamError::Io(e)
    }
}

impl From<CryptoError> for StreamError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::TagMismatch => StreamError::AuthenticationFailed,
            CryptoError::CiphertextTooShort { have, need } => StreamError::TruncatedStream(
                format!("ciphertext chunk of {have} bytes, need at least {need}"),
            ),
            other => StreamError::Crypto(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_round_trip_preserves_variant() {
        let io_err = StreamError::AuthenticationFailed.into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(StreamError::from(io_err), StreamError::AuthenticationFailed));
    }

    #[test]
    fn plain_io_error_stays_io() {
        let e = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(StreamError::from(e), StreamError::Io(_)));
    }

    #[test]
    fn password_prompt_classification() {
        assert!(StreamError::PasswordRequired.requires_password_prompt());
        assert!(StreamError::AuthenticationFailed.requires_password_prompt());
        assert!(!StreamError::TruncatedStream("x".into()).requires_password_prompt());
        assert!(!StreamError::UnsupportedFormat("x".into()).requires_password_prompt());
    }

    #[test]
    fn tag_mismatch_maps_to_authentication_failed() {
        let e: StreamError = CryptoError::TagMismatch.into();
        assert!(matches!(e, StreamError::AuthenticationFailed));
    }
}
