//! Choosing the single credential mode of a request.
//!
//! [`SELECTION_ORDER`] lists the modes in the order they are tried. The first
//! mode whose inputs are all present wins; any other populated source is
//! ignored, never merged. A source whose paired input is missing (a
//! PKCS#12 path without a password, a key without its certificate) does
//! not match and selection falls through to the next mode. That is not an
//! error, but it is logged because it usually is a mistake.

use crate::request::TlsContextRequest;

/// Where the client identity comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CredentialMode {
    /// No client certificate: server authentication only.
    None,
    /// Certificate and private key given as PEM text.
    CertAndKeyMemory,
    /// Certificate and private key read from PEM files.
    CertAndKeyPath,
    /// Private key on a PKCS#11 token.
    Pkcs11,
    /// Private key operations delegated to a caller-supplied handler.
    CustomKeyOperation,
    /// Certificate and key from a PKCS#12 container.
    Pkcs12Path,
    /// Certificate and key from the platform certificate store.
    WindowsCertStorePath,
}

/// Modes other than [`CredentialMode::None`], highest priority first.
pub const SELECTION_ORDER: [CredentialMode; 6] = [
    CredentialMode::CertAndKeyMemory,
    CredentialMode::CertAndKeyPath,
    CredentialMode::Pkcs11,
    CredentialMode::CustomKeyOperation,
    CredentialMode::Pkcs12Path,
    CredentialMode::WindowsCertStorePath,
];

impl CredentialMode {
    /// Whether every input this mode needs is present in `request`.
    pub fn is_satisfied_by(self, request: &TlsContextRequest) -> bool {
        match self {
            Self::None => true,
            Self::CertAndKeyMemory => {
                request.certificate_contents.is_some() && request.private_key_contents.is_some()
            }
            Self::CertAndKeyPath => {
                request.certificate_path.is_some() && request.private_key_path.is_some()
            }
            Self::Pkcs11 => request.pkcs11.is_some(),
            Self::CustomKeyOperation => request.custom_key_operation.is_some(),
            Self::Pkcs12Path => request.pkcs12_path.is_some() && request.pkcs12_password.is_some(),
            Self::WindowsCertStorePath => request.windows_cert_store_path.is_some(),
        }
    }

    /// Whether some but not all of this mode's paired inputs are present.
    fn is_partial_in(self, request: &TlsContextRequest) -> bool {
        let half = |a: bool, b: bool| a != b;
        match self {
            Self::CertAndKeyMemory => half(
                request.certificate_contents.is_some(),
                request.private_key_contents.is_some(),
            ),
            Self::CertAndKeyPath => half(
                request.certificate_path.is_some(),
                request.private_key_path.is_some(),
            ),
            Self::Pkcs12Path => half(
                request.pkcs12_path.is_some(),
                request.pkcs12_password.is_some(),
            ),
            _ => false,
        }
    }
}

/// The credential mode `request` selects.
pub fn select(request: &TlsContextRequest) -> CredentialMode {
    let mut chosen = CredentialMode::None;
    for mode in SELECTION_ORDER {
        if chosen == CredentialMode::None && mode.is_satisfied_by(request) {
            chosen = mode;
        } else if mode.is_satisfied_by(request) {
            log::debug!("Ignoring {mode:?} credentials in favour of {chosen:?}");
        } else if mode.is_partial_in(request) {
            log::warn!("Incomplete {mode:?} credentials ignored: paired input is missing");
        }
    }
    chosen
}
