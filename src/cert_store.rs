//! Client identities held in a platform certificate store.
//!
//! Store paths have the form `<location>\<store name>\<thumbprint>`, for
//! example `CurrentUser\MY\A11F8A9B5DF5B98BA3508FBCA575D09570E0D2C6`,
//! where the thumbprint is the SHA-1 hash of the certificate in hex.
//! Looking the certificate up is delegated to a [`PlatformCertStore`].
//! This crate ships no store backend, so unless the caller configures one
//! on the builder the mode fails with
//! [`TlsContextError::UnsupportedPlatform`].

use rustls::sign::CertifiedKey;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::TlsContextError;

/// Which registry hive the store lives under.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CertStoreLocation {
    /// Stores of the current user.
    CurrentUser,
    /// Stores of the machine.
    LocalMachine,
}

/// Parsed certificate store path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertStorePath {
    /// Registry hive.
    pub location: CertStoreLocation,
    /// Store name such as `MY`.
    pub store: String,
    /// SHA-1 hash of the certificate.
    pub thumbprint: [u8; 20],
}

impl FromStr for CertStorePath {
    type Err = TlsContextError;

    fn from_str(s: &str) -> Result<Self, TlsContextError> {
        let invalid = |why: &str| {
            TlsContextError::InvalidArgument(format!("certificate store path {s:?}: {why}"))
        };
        let mut parts = s.split('\\');
        let (Some(location), Some(store), Some(thumbprint), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected <location>\\<store>\\<thumbprint>"));
        };
        let location = if location.eq_ignore_ascii_case("CurrentUser") {
            CertStoreLocation::CurrentUser
        } else if location.eq_ignore_ascii_case("LocalMachine") {
            CertStoreLocation::LocalMachine
        } else {
            return Err(invalid("unknown location"));
        };
        if store.is_empty() {
            return Err(invalid("empty store name"));
        }
        let mut digest = [0u8; 20];
        hex::decode_to_slice(thumbprint, &mut digest)
            .map_err(|_| invalid("thumbprint must be 40 hex digits"))?;
        Ok(Self {
            location,
            store: store.to_owned(),
            thumbprint: digest,
        })
    }
}

impl fmt::Display for CertStorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match self.location {
            CertStoreLocation::CurrentUser => "CurrentUser",
            CertStoreLocation::LocalMachine => "LocalMachine",
        };
        write!(
            f,
            "{}\\{}\\{}",
            location,
            self.store,
            hex::encode_upper(self.thumbprint)
        )
    }
}

/// Platform certificate store lookups.
pub trait PlatformCertStore: Send + Sync {
    /// Find the certificate named by `path` and a signing key for it.
    fn find(&self, path: &CertStorePath) -> Result<Arc<CertifiedKey>, TlsContextError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "CurrentUser\\MY\\A11F8A9B5DF5B98BA3508FBCA575D09570E0D2C6";

    #[test]
    fn parse_and_display() {
        let p = PATH.parse::<CertStorePath>().unwrap();
        assert_eq!(p.location, CertStoreLocation::CurrentUser);
        assert_eq!(p.store, "MY");
        assert_eq!(p.thumbprint[0], 0xa1);
        assert_eq!(p.to_string(), PATH);
    }

    #[test]
    fn malformed() {
        for bad in [
            "",
            "CurrentUser\\MY",
            "Nowhere\\MY\\A11F8A9B5DF5B98BA3508FBCA575D09570E0D2C6",
            "CurrentUser\\\\A11F8A9B5DF5B98BA3508FBCA575D09570E0D2C6",
            "CurrentUser\\MY\\A11F",
            "CurrentUser\\MY\\A11F8A9B5DF5B98BA3508FBCA575D09570E0D2C6\\x",
        ] {
            assert!(
                matches!(
                    bad.parse::<CertStorePath>(),
                    Err(TlsContextError::InvalidArgument(_))
                ),
                "{bad:?}"
            );
        }
    }
}
