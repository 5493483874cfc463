//! Assembling a [`TlsContextConfig`] from a [`TlsContextRequest`].
//!
//! Construction proceeds in a fixed order: select the credential mode,
//! materialise that mode's identity, resolve the trust store, then apply
//! the global options. Every resource acquired along the way is owned by
//! a local value, so when a later step fails everything acquired by the
//! earlier ones is released (token sessions closed, handler references
//! dropped, secrets wiped) before the error is returned.

use rustls::crypto::CryptoProvider;
use rustls::sign::{CertifiedKey, SigningKey};
use rustls_pki_types::CertificateDer;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cert_store::{CertStorePath, PlatformCertStore};
use crate::certificate::{self, KeyAlgorithm};
use crate::config::{Credentials, TlsContextConfig};
use crate::error::TlsContextError;
use crate::files;
use crate::key_operation::HandlerSigningKey;
use crate::options::AlpnList;
use crate::pkcs11::Pkcs11Provider;
use crate::pkcs12;
use crate::request::TlsContextRequest;
use crate::selection::{self, CredentialMode};
use crate::trust::{self, CaPaths, TrustStoreOverride};

/// Builds [`TlsContextConfig`]s. Holds the collaborators used by the
/// credential modes that need one.
#[derive(Clone)]
pub struct TlsContextConfigBuilder {
    crypto_provider: Arc<CryptoProvider>,
    pkcs11: Option<Arc<dyn Pkcs11Provider>>,
    cert_store: Option<Arc<dyn PlatformCertStore>>,
}

impl Default for TlsContextConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "pkcs11")]
fn default_pkcs11_provider() -> Option<Arc<dyn Pkcs11Provider>> {
    Some(Arc::new(crate::pkcs11::CryptokiProvider))
}

#[cfg(not(feature = "pkcs11"))]
fn default_pkcs11_provider() -> Option<Arc<dyn Pkcs11Provider>> {
    None
}

/// Exactly one of `contents` and `path`, read into memory.
fn certificate_source(
    contents: Option<&Vec<u8>>,
    path: Option<&PathBuf>,
) -> Result<Vec<u8>, TlsContextError> {
    match (contents, path) {
        (Some(_), Some(_)) => Err(TlsContextError::ConflictingCertificateSource),
        (None, None) => Err(TlsContextError::MissingCertificate),
        (Some(pem), None) => Ok(pem.clone()),
        (None, Some(path)) => files::read(path),
    }
}

/// Chain and public key algorithm of a certificate whose private key is
/// held elsewhere.
fn remote_key_chain(
    pem: &[u8],
) -> Result<(Vec<CertificateDer<'static>>, KeyAlgorithm), TlsContextError> {
    let chain = certificate::parse_chain(pem)?;
    let algorithm = KeyAlgorithm::of_certificate(&chain[0])?;
    Ok((chain, algorithm))
}

type Identity = (Credentials, Option<Arc<CertifiedKey>>);

impl TlsContextConfigBuilder {
    /// A builder using the default crypto provider and, with the `pkcs11`
    /// feature, the cryptoki PKCS#11 backend. No platform certificate
    /// store is configured.
    pub fn new() -> Self {
        Self {
            crypto_provider: crate::crypto_provider::default_provider(),
            pkcs11: default_pkcs11_provider(),
            cert_store: None,
        }
    }

    /// Use `provider` for key loading and for the TLS contexts.
    pub fn with_crypto_provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.crypto_provider = provider;
        self
    }

    /// Resolve PKCS#11 selections with `provider`.
    pub fn with_pkcs11_provider(mut self, provider: Arc<dyn Pkcs11Provider>) -> Self {
        self.pkcs11 = Some(provider);
        self
    }

    /// Look up certificate store paths in `store`.
    pub fn with_platform_cert_store(mut self, store: Arc<dyn PlatformCertStore>) -> Self {
        self.cert_store = Some(store);
        self
    }

    /// Validate `request` and produce a configuration owning copies of
    /// everything it needs. `request` is not modified and may be reused.
    ///
    /// # Errors
    ///
    /// Any [`TlsContextError`] describing the first step that failed.
    /// Nothing acquired during the attempt outlives the error.
    pub fn build(&self, request: &TlsContextRequest) -> Result<TlsContextConfig, TlsContextError> {
        let mode = selection::select(request);
        log::debug!("Client credential mode: {mode:?}");
        let (credentials, identity) = self.identity(mode, request)?;

        let trust_store_override = trust_store_override(request);
        let root_store = match trust_store_override {
            Some(ref o) => o.load()?,
            None => trust::platform_roots(),
        };

        let alpn_protocols = AlpnList::new(request.alpn_protocols.iter().cloned())?;
        if !request.verify_peer {
            log::warn!("Building a TLS configuration that does not verify servers");
        }

        Ok(TlsContextConfig {
            credentials,
            identity,
            trust_store_override,
            root_store: Arc::new(root_store),
            minimum_tls_version: request.minimum_tls_version,
            cipher_preference: request.cipher_preference,
            verify_peer: request.verify_peer,
            alpn_protocols,
            crypto_provider: Arc::clone(&self.crypto_provider),
        })
    }

    fn identity(
        &self,
        mode: CredentialMode,
        request: &TlsContextRequest,
    ) -> Result<Identity, TlsContextError> {
        match mode {
            CredentialMode::None => Ok((Credentials::None, None)),
            CredentialMode::CertAndKeyMemory => self.cert_and_key_memory(request),
            CredentialMode::CertAndKeyPath => self.cert_and_key_path(request),
            CredentialMode::Pkcs11 => self.pkcs11(request),
            CredentialMode::CustomKeyOperation => self.custom_key_operation(request),
            CredentialMode::Pkcs12Path => self.pkcs12(request),
            CredentialMode::WindowsCertStorePath => self.windows_cert_store(request),
        }
    }

    fn cert_and_key_memory(&self, request: &TlsContextRequest) -> Result<Identity, TlsContextError> {
        let (Some(certificate), Some(private_key)) = (
            request.certificate_contents.clone(),
            request.private_key_contents.clone(),
        ) else {
            return Err(TlsContextError::MissingCertificate);
        };
        let identity = certificate::certified_key(
            &self.crypto_provider,
            certificate::parse_chain(&certificate)?,
            &*certificate::parse_private_key(&private_key)?,
        )?;
        Ok((
            Credentials::CertAndKeyMemory {
                certificate,
                private_key,
            },
            Some(identity),
        ))
    }

    fn cert_and_key_path(&self, request: &TlsContextRequest) -> Result<Identity, TlsContextError> {
        let (Some(certificate_path), Some(private_key_path)) = (
            request.certificate_path.clone(),
            request.private_key_path.clone(),
        ) else {
            return Err(TlsContextError::MissingCertificate);
        };
        let chain = certificate::parse_chain(&files::read(&certificate_path)?)?;
        let key = certificate::parse_private_key(&files::read_sensitive(&private_key_path)?)?;
        let identity = certificate::certified_key(&self.crypto_provider, chain, &key)?;
        Ok((
            Credentials::CertAndKeyPath {
                certificate_path,
                private_key_path,
            },
            Some(identity),
        ))
    }

    fn pkcs11(&self, request: &TlsContextRequest) -> Result<Identity, TlsContextError> {
        let Some(ref selection) = request.pkcs11 else {
            return Err(TlsContextError::MissingCertificate);
        };
        let provider = self.pkcs11.as_ref().ok_or_else(|| {
            TlsContextError::UnsupportedPlatform("no PKCS#11 provider configured".into())
        })?;
        let certificate = certificate_source(
            selection.certificate_contents.as_ref(),
            selection.certificate_path.as_ref(),
        )?;
        let (chain, algorithm) = remote_key_chain(&certificate)?;
        let handle = provider.open(selection, algorithm)?;
        log::debug!("Opened PKCS#11 key {selection}");
        let identity = Arc::new(CertifiedKey::new(chain, Arc::clone(&handle)));
        Ok((
            Credentials::Pkcs11 {
                selection: selection.clone(),
                certificate,
                handle,
            },
            Some(identity),
        ))
    }

    fn custom_key_operation(
        &self,
        request: &TlsContextRequest,
    ) -> Result<Identity, TlsContextError> {
        let Some(ref options) = request.custom_key_operation else {
            return Err(TlsContextError::MissingCertificate);
        };
        let certificate = certificate_source(
            options.certificate_contents.as_ref(),
            options.certificate_path.as_ref(),
        )?;
        let (chain, algorithm) = remote_key_chain(&certificate)?;
        let key = Arc::new(HandlerSigningKey::new(
            Arc::clone(&options.handler),
            algorithm,
        ));
        let signing_key: Arc<dyn SigningKey> = key.clone();
        let identity = Arc::new(CertifiedKey::new(chain, signing_key));
        Ok((
            Credentials::CustomKeyOperation { certificate, key },
            Some(identity),
        ))
    }

    fn pkcs12(&self, request: &TlsContextRequest) -> Result<Identity, TlsContextError> {
        let (Some(path), Some(password)) =
            (request.pkcs12_path.clone(), request.pkcs12_password.clone())
        else {
            return Err(TlsContextError::MissingCertificate);
        };
        let identity = pkcs12::load(&path, &password, &self.crypto_provider)?;
        Ok((Credentials::Pkcs12Path { path, password }, Some(identity)))
    }

    fn windows_cert_store(&self, request: &TlsContextRequest) -> Result<Identity, TlsContextError> {
        let Some(ref path) = request.windows_cert_store_path else {
            return Err(TlsContextError::MissingCertificate);
        };
        let path = path.parse::<CertStorePath>()?;
        let store = self.cert_store.as_ref().ok_or_else(|| {
            TlsContextError::UnsupportedPlatform(
                "no platform certificate store available".into(),
            )
        })?;
        let identity = store.find(&path)?;
        Ok((Credentials::WindowsCertStorePath { path }, Some(identity)))
    }
}

fn trust_store_override(request: &TlsContextRequest) -> Option<TrustStoreOverride> {
    if let Some(ref pem) = request.inline_ca_bundle {
        return Some(TrustStoreOverride::InlineCaBundle(pem.clone()));
    }
    CaPaths::new(request.ca_file_path.clone(), request.ca_dir_path.clone())
        .map(TrustStoreOverride::FilePaths)
}
