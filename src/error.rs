//! Error types returned while assembling a [`crate::TlsContextConfig`].

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type returned by tls_context_config functions
#[derive(Debug, Error)]
pub enum TlsContextError {
    /// More than one certificate source was supplied where exactly one
    /// is required.
    #[error("cannot have both certificate file path and certificate contents")]
    ConflictingCertificateSource,
    /// A required certificate source is absent.
    #[error("no certificate set")]
    MissingCertificate,
    /// Certificate, key or PKCS#12 material is present but malformed or
    /// mismatched.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// A path-based source does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// A path-based source exists but could not be read.
    #[error("could not read {}: {source}", path.display())]
    IoError {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Token, slot or key resolution failed.
    #[error("{0}")]
    Pkcs11Error(#[from] Pkcs11Error),
    /// CA bundle or CA path is malformed or empty.
    #[error("invalid trust store: {0}")]
    InvalidTrustStore(String),
    /// An enumeration value is out of range or an ALPN list is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The requested mode cannot be supported on this platform or backend.
    #[error("unsupported on this platform: {0}")]
    UnsupportedPlatform(String),
    /// Wrapper for rustls::Error
    #[error("{0}")]
    TLSError(#[from] rustls::Error),
}

impl TlsContextError {
    /// Classify an I/O failure on `path` as [`TlsContextError::FileNotFound`]
    /// or [`TlsContextError::IoError`].
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::IoError {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Failure reported by a [`crate::pkcs11::Pkcs11Provider`].
#[derive(Debug, Error)]
pub enum Pkcs11Error {
    /// The PKCS#11 module could not be loaded or initialised.
    #[error("PKCS#11 library {}: {reason}", path.display())]
    Library {
        /// Path of the module.
        path: PathBuf,
        /// Detail from the module loader.
        reason: String,
    },
    /// No slot matched the selection.
    #[error("no PKCS#11 token matches {0}")]
    TokenNotFound(String),
    /// The user PIN was rejected.
    #[error("PKCS#11 login failed: {0}")]
    Login(String),
    /// No private key object matched the selection.
    #[error("no PKCS#11 private key matches {0}")]
    KeyNotFound(String),
    /// Any other error from the token.
    #[error("PKCS#11 error: {0}")]
    Backend(String),
}

/// Failure from a [`crate::key_operation::KeyOperationHandler`].
#[derive(Debug, Error)]
pub enum KeyOperationError {
    /// The handler does not implement the requested operation.
    #[error("key operation not supported by handler")]
    Unsupported,
    /// The handler attempted the operation and failed.
    #[error("key operation failed: {0}")]
    Failed(String),
}

impl From<KeyOperationError> for rustls::Error {
    fn from(e: KeyOperationError) -> Self {
        rustls::Error::General(e.to_string())
    }
}
