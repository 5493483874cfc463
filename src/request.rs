//! Inputs to [`crate::TlsContextConfigBuilder::build`].
//!
//! A [`TlsContextRequest`] is a bag of optional credential sources plus the
//! global options. More than one credential source may be populated; the
//! builder picks exactly one of them by a fixed priority order (see
//! [`crate::selection`]) and ignores the rest.

use std::path::PathBuf;
use std::sync::Arc;

use crate::key_operation::KeyOperationHandler;
use crate::options::{TlsCipherPreference, TlsVersion};
use crate::pkcs11::Pkcs11Selection;
use crate::sensitive::{SensitiveBytes, SensitiveString};

/// A caller-supplied key operation handler and the certificate it
/// answers for. Exactly one of the certificate sources must be set.
#[derive(Clone, Debug)]
pub struct CustomKeyOperationOptions {
    /// Performs private key operations.
    pub handler: Arc<dyn KeyOperationHandler>,
    /// PEM certificate chain.
    pub certificate_contents: Option<Vec<u8>>,
    /// File holding the PEM certificate chain.
    pub certificate_path: Option<PathBuf>,
}

impl CustomKeyOperationOptions {
    /// Use `handler`; a certificate source must still be added.
    pub fn new(handler: Arc<dyn KeyOperationHandler>) -> Self {
        Self {
            handler,
            certificate_contents: None,
            certificate_path: None,
        }
    }

    /// Certificate chain given as PEM text.
    pub fn with_certificate_contents(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.certificate_contents = Some(pem.into());
        self
    }

    /// Certificate chain read from a PEM file.
    pub fn with_certificate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_path = Some(path.into());
        self
    }
}

/// Everything a client TLS context can be configured from.
#[derive(Clone, Debug)]
pub struct TlsContextRequest {
    /// PEM certificate chain, used together with `private_key_contents`.
    pub certificate_contents: Option<Vec<u8>>,
    /// PEM private key, used together with `certificate_contents`.
    pub private_key_contents: Option<SensitiveBytes>,
    /// PEM certificate chain file, used together with `private_key_path`.
    pub certificate_path: Option<PathBuf>,
    /// PEM private key file, used together with `certificate_path`.
    pub private_key_path: Option<PathBuf>,
    /// Private key on a PKCS#11 token.
    pub pkcs11: Option<Pkcs11Selection>,
    /// Private key operations delegated to the caller.
    pub custom_key_operation: Option<CustomKeyOperationOptions>,
    /// PKCS#12 container, used together with `pkcs12_password`.
    pub pkcs12_path: Option<PathBuf>,
    /// Password for `pkcs12_path`.
    pub pkcs12_password: Option<SensitiveString>,
    /// Platform certificate store path such as `CurrentUser\MY\<thumbprint>`.
    pub windows_cert_store_path: Option<String>,
    /// PEM CA bundle replacing the default trust store.
    pub inline_ca_bundle: Option<Vec<u8>>,
    /// PEM CA file replacing the default trust store.
    pub ca_file_path: Option<PathBuf>,
    /// CA directory replacing the default trust store.
    pub ca_dir_path: Option<PathBuf>,
    /// Verify the server certificate. Turning this off is dangerous.
    pub verify_peer: bool,
    /// ALPN protocol identifiers in preference order.
    pub alpn_protocols: Vec<String>,
    /// Lowest protocol version to negotiate.
    pub minimum_tls_version: TlsVersion,
    /// Cipher-suite policy.
    pub cipher_preference: TlsCipherPreference,
}

impl Default for TlsContextRequest {
    fn default() -> Self {
        Self {
            certificate_contents: None,
            private_key_contents: None,
            certificate_path: None,
            private_key_path: None,
            pkcs11: None,
            custom_key_operation: None,
            pkcs12_path: None,
            pkcs12_password: None,
            windows_cert_store_path: None,
            inline_ca_bundle: None,
            ca_file_path: None,
            ca_dir_path: None,
            verify_peer: true,
            alpn_protocols: Vec::new(),
            minimum_tls_version: TlsVersion::default(),
            cipher_preference: TlsCipherPreference::default(),
        }
    }
}

impl TlsContextRequest {
    /// Client certificate and private key given as PEM text.
    pub fn with_cert_and_key(mut self, cert: impl Into<Vec<u8>>, key: &[u8]) -> Self {
        self.certificate_contents = Some(cert.into());
        self.private_key_contents = Some(SensitiveBytes::copy_from(key));
        self
    }

    /// Client certificate and private key read from PEM files.
    pub fn with_cert_and_key_paths(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.certificate_path = Some(cert.into());
        self.private_key_path = Some(key.into());
        self
    }

    /// Private key on a PKCS#11 token.
    pub fn with_pkcs11(mut self, selection: Pkcs11Selection) -> Self {
        self.pkcs11 = Some(selection);
        self
    }

    /// Private key operations performed by the caller.
    pub fn with_custom_key_operation(mut self, options: CustomKeyOperationOptions) -> Self {
        self.custom_key_operation = Some(options);
        self
    }

    /// Client identity from a PKCS#12 container.
    pub fn with_pkcs12(
        mut self,
        path: impl Into<PathBuf>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        self.pkcs12_path = Some(path.into());
        self.pkcs12_password = Some(password.into());
        self
    }

    /// Client identity from the platform certificate store.
    pub fn with_windows_cert_store_path(mut self, path: impl Into<String>) -> Self {
        self.windows_cert_store_path = Some(path.into());
        self
    }

    /// Trust only the CA certificates in `pem`.
    pub fn with_inline_ca_bundle(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.inline_ca_bundle = Some(pem.into());
        self
    }

    /// Trust only the CA certificates in this file.
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file_path = Some(path.into());
        self
    }

    /// Trust only the CA certificates in this directory.
    pub fn with_ca_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_dir_path = Some(path.into());
        self
    }

    /// Whether to verify the server certificate.
    pub fn with_verify_peer(mut self, verify_peer: bool) -> Self {
        self.verify_peer = verify_peer;
        self
    }

    /// Offer these ALPN protocols, most preferred first.
    pub fn with_alpn_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alpn_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Lowest protocol version to negotiate.
    pub fn with_minimum_tls_version(mut self, v: TlsVersion) -> Self {
        self.minimum_tls_version = v;
        self
    }

    /// Cipher-suite policy.
    pub fn with_cipher_preference(mut self, p: TlsCipherPreference) -> Self {
        self.cipher_preference = p;
        self
    }
}
