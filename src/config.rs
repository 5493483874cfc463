//! The finished, immutable client TLS configuration.
//!
//! A [`TlsContextConfig`] owns everything its credential mode needs: copies
//! of the caller's certificate and key material, the token handle or key
//! operation handler, and the resolved trust anchors. It can be shared
//! between threads and turned into any number of independent
//! [`rustls::ClientConfig`]s with [`TlsContextConfig::client_config`].
//! Dropping it releases every resource it holds and wipes its secrets.

use rustls::client::ResolvesClientCert;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::cert_store::CertStorePath;
use crate::error::TlsContextError;
use crate::key_operation::{HandlerSigningKey, KeyOperationHandler};
use crate::options::{AlpnList, TlsCipherPreference, TlsVersion};
use crate::pkcs11::{Pkcs11Handle, Pkcs11Selection};
use crate::selection::CredentialMode;
use crate::sensitive::{SensitiveBytes, SensitiveString};
use crate::trust::TrustStoreOverride;

/// Owned material of the selected credential mode.
#[derive(Debug)]
pub enum Credentials {
    /// No client certificate.
    None,
    /// Copies of the PEM certificate chain and private key.
    CertAndKeyMemory {
        /// PEM certificate chain.
        certificate: Vec<u8>,
        /// PEM private key.
        private_key: SensitiveBytes,
    },
    /// Files the certificate chain and private key were loaded from.
    CertAndKeyPath {
        /// PEM certificate chain file.
        certificate_path: PathBuf,
        /// PEM private key file.
        private_key_path: PathBuf,
    },
    /// A key on a PKCS#11 token.
    Pkcs11 {
        /// Module, token and key that were opened.
        selection: Pkcs11Selection,
        /// PEM certificate chain for the key.
        certificate: Vec<u8>,
        /// Open key, released when the configuration is dropped.
        handle: Pkcs11Handle,
    },
    /// A caller-supplied key operation handler.
    CustomKeyOperation {
        /// PEM certificate chain for the handler's key.
        certificate: Vec<u8>,
        /// Signing key holding the configuration's reference to the handler.
        key: Arc<HandlerSigningKey>,
    },
    /// A PKCS#12 container.
    Pkcs12Path {
        /// Container file.
        path: PathBuf,
        /// Container password.
        password: SensitiveString,
    },
    /// An entry of the platform certificate store.
    WindowsCertStorePath {
        /// Store and thumbprint of the certificate.
        path: CertStorePath,
    },
}

impl Credentials {
    /// The mode this material belongs to.
    pub fn mode(&self) -> CredentialMode {
        match self {
            Self::None => CredentialMode::None,
            Self::CertAndKeyMemory { .. } => CredentialMode::CertAndKeyMemory,
            Self::CertAndKeyPath { .. } => CredentialMode::CertAndKeyPath,
            Self::Pkcs11 { .. } => CredentialMode::Pkcs11,
            Self::CustomKeyOperation { .. } => CredentialMode::CustomKeyOperation,
            Self::Pkcs12Path { .. } => CredentialMode::Pkcs12Path,
            Self::WindowsCertStorePath { .. } => CredentialMode::WindowsCertStorePath,
        }
    }
}

/// Immutable client TLS configuration produced by
/// [`crate::TlsContextConfigBuilder::build`].
#[derive(Debug)]
pub struct TlsContextConfig {
    pub(crate) credentials: Credentials,
    pub(crate) identity: Option<Arc<CertifiedKey>>,
    pub(crate) trust_store_override: Option<TrustStoreOverride>,
    pub(crate) root_store: Arc<RootCertStore>,
    pub(crate) minimum_tls_version: TlsVersion,
    pub(crate) cipher_preference: TlsCipherPreference,
    pub(crate) verify_peer: bool,
    pub(crate) alpn_protocols: AlpnList,
    pub(crate) crypto_provider: Arc<CryptoProvider>,
}

impl TlsContextConfig {
    /// Where the client identity comes from.
    pub fn credential_mode(&self) -> CredentialMode {
        self.credentials.mode()
    }

    /// Owned material of the credential mode.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Certificate chain presented to servers, leaf first.
    pub fn certificate_chain(&self) -> Option<&[CertificateDer<'static>]> {
        self.identity.as_ref().map(|id| id.cert.as_slice())
    }

    /// Expiry of the client certificate.
    pub fn identity_valid_until(&self) -> Option<OffsetDateTime> {
        self.identity
            .as_ref()
            .and_then(|id| id.end_entity_cert().ok())
            .and_then(crate::certificate::valid_until)
    }

    /// Replacement for the platform trust store, if any.
    pub fn trust_store_override(&self) -> Option<&TrustStoreOverride> {
        self.trust_store_override.as_ref()
    }

    /// Trust anchors used to verify servers.
    pub fn root_store(&self) -> &RootCertStore {
        &self.root_store
    }

    /// Lowest protocol version negotiated.
    pub fn minimum_tls_version(&self) -> TlsVersion {
        self.minimum_tls_version
    }

    /// Cipher-suite policy.
    pub fn cipher_preference(&self) -> TlsCipherPreference {
        self.cipher_preference
    }

    /// Whether server certificates are verified.
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// ALPN protocols offered, most preferred first.
    pub fn alpn_protocols(&self) -> &AlpnList {
        &self.alpn_protocols
    }

    /// Open token key in [`CredentialMode::Pkcs11`].
    pub fn pkcs11_handle(&self) -> Option<&Pkcs11Handle> {
        match self.credentials {
            Credentials::Pkcs11 { ref handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Handler performing key operations in
    /// [`CredentialMode::CustomKeyOperation`].
    pub fn custom_key_operation_handler(&self) -> Option<&Arc<dyn KeyOperationHandler>> {
        match self.credentials {
            Credentials::CustomKeyOperation { ref key, .. } => Some(key.handler()),
            _ => None,
        }
    }

    /// Returns a new TLS [`ClientConfig`] for this configuration. Each call
    /// produces an independent context.
    ///
    /// # Errors
    ///
    /// [`TlsContextError::UnsupportedPlatform`] if the cipher preference
    /// cannot be implemented by the crypto provider, or
    /// [`TlsContextError::TLSError`] if the provider has no cipher suite
    /// for the permitted protocol versions.
    pub fn client_config(&self) -> Result<ClientConfig, TlsContextError> {
        let provider = Arc::new(self.cipher_preference.apply(&self.crypto_provider)?);
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(self.minimum_tls_version.protocol_versions())?;
        let builder = if self.verify_peer {
            builder.with_root_certificates(Arc::clone(&self.root_store))
        } else {
            log::warn!("Server certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert {
                    supported_algs: provider.signature_verification_algorithms,
                }))
        };
        let mut config = match self.identity {
            Some(ref identity) => {
                builder.with_client_cert_resolver(Arc::new(FixedIdentity(Arc::clone(identity))))
            }
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols = self.alpn_protocols.to_wire();
        Ok(config)
    }
}

#[derive(Debug)]
struct FixedIdentity(Arc<CertifiedKey>);

impl ResolvesClientCert for FixedIdentity {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// Accepts any server certificate but still checks that the server holds
/// the certificate's key.
#[derive(Debug)]
struct AcceptAnyServerCert {
    supported_algs: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported_algs.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TlsContextConfigBuilder;
    use crate::request::{CustomKeyOperationOptions, TlsContextRequest};
    use crate::testdata;
    use rustls::ServerConfig;
    use rustls::server::WebPkiClientVerifier;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_rustls::{TlsAcceptor, TlsConnector};

    #[derive(Debug, PartialEq)]
    struct Outcome {
        client_certificate: Option<CertificateDer<'static>>,
        alpn: Option<Vec<u8>>,
    }

    fn certs(pem: &[u8]) -> Vec<CertificateDer<'static>> {
        rustls_pemfile::certs(&mut Cursor::new(pem))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn server_config(require_client_auth: bool, alpn: &[&[u8]]) -> Arc<ServerConfig> {
        let provider = crate::crypto_provider::default_provider();
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .unwrap();
        let builder = if require_client_auth {
            let mut roots = RootCertStore::empty();
            roots.add_parsable_certificates(certs(testdata::CACERT));
            builder.with_client_cert_verifier(
                WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .build()
                    .unwrap(),
            )
        } else {
            builder.with_no_client_auth()
        };
        let mut sc = builder
            .with_single_cert(
                certs(testdata::USER2_CERT),
                rustls_pemfile::private_key(&mut Cursor::new(testdata::USER2_KEY))
                    .unwrap()
                    .unwrap(),
            )
            .unwrap();
        sc.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        Arc::new(sc)
    }

    async fn talk(cc: ClientConfig, sc: Arc<ServerConfig>) -> std::io::Result<Outcome> {
        let (client, server) = tokio::io::duplex(64);
        let client = TlsConnector::from(Arc::new(cc))
            .connect(ServerName::try_from("user2").unwrap(), client);
        let server = TlsAcceptor::from(sc).accept(server);
        let client_task = async move {
            let mut stream = client.await?;
            stream.write_all(b"hello").await?;
            stream.flush().await?;
            let mut buf = vec![0u8; 3];
            stream.read_exact(&mut buf).await?;
            assert_eq!(buf, b"bye");
            Ok::<_, std::io::Error>(stream.get_ref().1.alpn_protocol().map(<[u8]>::to_vec))
        };
        let server_task = async move {
            let mut stream = server.await?;
            let seen = stream
                .get_ref()
                .1
                .peer_certificates()
                .and_then(|c| c.first())
                .cloned();
            let mut buf = vec![0u8; 5];
            stream.read_exact(&mut buf).await?;
            assert_eq!(buf, b"hello");
            stream.write_all(b"bye").await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(seen)
        };
        let (alpn, client_certificate) = futures::future::join(client_task, server_task).await;
        Ok(Outcome {
            client_certificate: client_certificate?,
            alpn: alpn?,
        })
    }

    fn trusting_ca() -> TlsContextRequest {
        TlsContextRequest::default().with_inline_ca_bundle(testdata::CACERT)
    }

    fn build(request: &TlsContextRequest) -> TlsContextConfig {
        TlsContextConfigBuilder::new().build(request).unwrap()
    }

    #[tokio::test]
    async fn server_auth_only() {
        let config = build(&trusting_ca());
        assert_eq!(config.credential_mode(), CredentialMode::None);
        let outcome = talk(config.client_config().unwrap(), server_config(false, &[]))
            .await
            .unwrap();
        assert_eq!(outcome.client_certificate, None);
    }

    #[tokio::test]
    async fn memory_and_path_identities_behave_alike() {
        let files = testdata::CertAndKeyFiles::user1().unwrap();
        let from_memory =
            build(&trusting_ca().with_cert_and_key(testdata::USER1_CERT, testdata::USER1_KEY));
        let from_files =
            build(&trusting_ca().with_cert_and_key_paths(files.cert_path(), files.key_path()));
        assert_eq!(from_memory.credential_mode(), CredentialMode::CertAndKeyMemory);
        assert_eq!(from_files.credential_mode(), CredentialMode::CertAndKeyPath);
        assert_eq!(from_memory.certificate_chain(), from_files.certificate_chain());

        let a = talk(from_memory.client_config().unwrap(), server_config(true, &[]))
            .await
            .unwrap();
        let b = talk(from_files.client_config().unwrap(), server_config(true, &[]))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.client_certificate, Some(certs(testdata::USER1_CERT).remove(0)));
    }

    #[tokio::test]
    async fn custom_key_operation_handshake() {
        let handler: Arc<dyn KeyOperationHandler> = Arc::new(testdata::LocalKeyHandler::user1());
        let config = build(&trusting_ca().with_custom_key_operation(
            CustomKeyOperationOptions::new(Arc::clone(&handler))
                .with_certificate_contents(testdata::USER1_CERT),
        ));
        assert!(Arc::ptr_eq(
            config.custom_key_operation_handler().unwrap(),
            &handler
        ));
        let outcome = talk(config.client_config().unwrap(), server_config(true, &[]))
            .await
            .unwrap();
        assert_eq!(
            outcome.client_certificate,
            Some(certs(testdata::USER1_CERT).remove(0))
        );
    }

    #[tokio::test]
    async fn alpn_offered_in_client_order() {
        let config = build(&trusting_ca().with_alpn_protocols(["h2", "http/1.1"]));
        let cc = config.client_config().unwrap();
        assert_eq!(cc.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
        // The server picks, so only the protocol both sides know can win.
        let outcome = talk(cc, server_config(false, &[b"spdy/3", b"http/1.1"]))
            .await
            .unwrap();
        assert_eq!(outcome.alpn.as_deref(), Some(&b"http/1.1"[..]));
    }

    #[tokio::test]
    async fn untrusted_server_refused() {
        // user1 is a leaf, not the issuer of the server certificate.
        let request = TlsContextRequest::default().with_inline_ca_bundle(testdata::USER1_CERT);
        let config = build(&request);
        assert!(
            talk(config.client_config().unwrap(), server_config(false, &[]))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn no_verify_accepts_untrusted_server() {
        let request = TlsContextRequest::default()
            .with_inline_ca_bundle(testdata::USER1_CERT)
            .with_verify_peer(false);
        let config = build(&request);
        assert!(!config.verify_peer());
        talk(config.client_config().unwrap(), server_config(false, &[]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tls13_floor() {
        let config = build(&trusting_ca().with_minimum_tls_version(TlsVersion::TlsV1_3));
        let cc = config.client_config().unwrap();
        talk(cc, server_config(false, &[])).await.unwrap();
    }

    #[test]
    fn independent_client_configs() {
        let config = build(&trusting_ca().with_alpn_protocols(["h2"]));
        let mut a = config.client_config().unwrap();
        let b = config.client_config().unwrap();
        a.alpn_protocols.clear();
        assert_eq!(b.alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn retired_cipher_preference() {
        let config = build(
            &trusting_ca().with_cipher_preference(TlsCipherPreference::KmsPqTlsv1_0_2019_06),
        );
        assert!(matches!(
            config.client_config(),
            Err(TlsContextError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn identity_expiry() {
        let config =
            build(&trusting_ca().with_cert_and_key(testdata::USER1_CERT, testdata::USER1_KEY));
        assert!(config.identity_valid_until().unwrap() > OffsetDateTime::now_utc());
        assert!(build(&trusting_ca()).identity_valid_until().is_none());
    }

    #[test]
    fn shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TlsContextConfig>();
    }
}
