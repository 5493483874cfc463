//! Parsing and validating certificate and key material.

use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::{SignatureAlgorithm, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::io::Cursor;
use std::sync::Arc;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use zeroize::Zeroizing;

use crate::error::TlsContextError;
use crate::sensitive::SensitiveBytes;

const OID_ED25519: &str = "1.3.101.112";

/// Parse PEM text into a certificate chain, leaf first. At least one
/// certificate must be present and every one must be valid X.509.
pub(crate) fn parse_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsContextError> {
    let chain = rustls_pemfile::certs(&mut Cursor::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsContextError::InvalidCredentials(format!("certificate PEM: {e}")))?;
    if chain.is_empty() {
        return Err(TlsContextError::InvalidCredentials(
            "no certificate found".into(),
        ));
    }
    for cert in &chain {
        X509Certificate::from_der(cert.as_ref()).map_err(|e| {
            TlsContextError::InvalidCredentials(format!("unparseable certificate: {e}"))
        })?;
    }
    Ok(chain)
}

/// Parse the first private key out of PEM text. The decoded DER is wiped
/// when the returned value is dropped.
pub(crate) fn parse_private_key(
    pem: &SensitiveBytes,
) -> Result<Zeroizing<PrivateKeyDer<'static>>, TlsContextError> {
    rustls_pemfile::private_key(&mut Cursor::new(pem.expose()))
        .map_err(|e| TlsContextError::InvalidCredentials(format!("private key PEM: {e}")))?
        .map(Zeroizing::new)
        .ok_or_else(|| TlsContextError::InvalidCredentials("no private key found".into()))
}

/// Load `key` with `provider` and pair it with `chain`, refusing a key
/// that does not belong to the leaf certificate.
pub(crate) fn certified_key(
    provider: &CryptoProvider,
    chain: Vec<CertificateDer<'static>>,
    key: &PrivateKeyDer<'_>,
) -> Result<Arc<CertifiedKey>, TlsContextError> {
    let key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| TlsContextError::InvalidCredentials(format!("private key: {e}")))?;
    let certified_key = CertifiedKey::new(chain, key);
    certified_key
        .keys_match()
        .map_err(|e| TlsContextError::InvalidCredentials(format!("{e}")))?;
    Ok(Arc::new(certified_key))
}

/// Expiry of the leaf certificate, if it can be read.
pub(crate) fn valid_until(leaf: &CertificateDer<'_>) -> Option<OffsetDateTime> {
    X509Certificate::from_der(leaf.as_ref())
        .ok()
        .map(|(_, c)| c.validity().not_after.to_datetime())
}

/// Public key algorithm of a certificate, which decides the signature
/// schemes a remote private key can offer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA, any modulus size.
    Rsa,
    /// ECDSA on NIST P-256.
    EcdsaP256,
    /// ECDSA on NIST P-384.
    EcdsaP384,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgorithm {
    /// Identify the algorithm of the subject public key in `cert`.
    pub fn of_certificate(cert: &CertificateDer<'_>) -> Result<Self, TlsContextError> {
        let (_, parsed) = X509Certificate::from_der(cert.as_ref()).map_err(|e| {
            TlsContextError::InvalidCredentials(format!("unparseable certificate: {e}"))
        })?;
        let spki = parsed.public_key();
        if spki.algorithm.algorithm.to_id_string() == OID_ED25519 {
            return Ok(Self::Ed25519);
        }
        match spki.parsed() {
            Ok(PublicKey::RSA(_)) => Ok(Self::Rsa),
            Ok(PublicKey::EC(point)) => match point.key_size() {
                256 => Ok(Self::EcdsaP256),
                384 => Ok(Self::EcdsaP384),
                bits => Err(TlsContextError::InvalidCredentials(format!(
                    "unsupported elliptic curve of {bits} bits"
                ))),
            },
            _ => Err(TlsContextError::InvalidCredentials(format!(
                "unsupported public key algorithm {}",
                spki.algorithm.algorithm.to_id_string()
            ))),
        }
    }

    /// The rustls name for this algorithm family.
    pub fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::Rsa => SignatureAlgorithm::RSA,
            Self::EcdsaP256 | Self::EcdsaP384 => SignatureAlgorithm::ECDSA,
            Self::Ed25519 => SignatureAlgorithm::ED25519,
        }
    }

    /// Signature schemes a key of this algorithm can produce, most
    /// preferred first.
    pub fn schemes(self) -> &'static [SignatureScheme] {
        match self {
            Self::Rsa => &[
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA256,
            ],
            Self::EcdsaP256 => &[SignatureScheme::ECDSA_NISTP256_SHA256],
            Self::EcdsaP384 => &[SignatureScheme::ECDSA_NISTP384_SHA384],
            Self::Ed25519 => &[SignatureScheme::ED25519],
        }
    }

    /// First of our schemes that the peer offered.
    pub(crate) fn choose(self, offered: &[SignatureScheme]) -> Option<SignatureScheme> {
        self.schemes().iter().copied().find(|s| offered.contains(s))
    }
}
