//! Routing private-key operations through a caller-supplied handler.
//!
//! In [`crate::CredentialMode::CustomKeyOperation`] the configuration
//! never holds a private key. It holds the certificate and a shared
//! reference to a [`KeyOperationHandler`] which the handshake calls
//! whenever the client must prove possession of the key.
//!
//! Ownership of the handler is shared through [`Arc`]: the configuration
//! keeps exactly one strong reference for as long as it lives, so the
//! handler outlives every configuration and registry that uses it and is
//! freed when the last of them lets go.

use rustls::sign::{Signer, SigningKey};
use rustls::{SignatureAlgorithm, SignatureScheme};
use std::fmt;
use std::sync::Arc;

use crate::certificate::KeyAlgorithm;
use crate::error::KeyOperationError;
use crate::sensitive::SensitiveBytes;

/// Private-key operations performed on behalf of the TLS engine.
pub trait KeyOperationHandler: Send + Sync + fmt::Debug {
    /// Sign `message` with `scheme`. `message` is the complete data to be
    /// signed; hashing (and padding for RSA) is part of the scheme.
    fn sign(&self, scheme: SignatureScheme, message: &[u8]) -> Result<Vec<u8>, KeyOperationError>;

    /// Decrypt `ciphertext` with the private key. Key-exchange modes that
    /// need this are not negotiated by the current backend so the default
    /// refuses.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<SensitiveBytes, KeyOperationError> {
        let _ = ciphertext;
        Err(KeyOperationError::Unsupported)
    }
}

/// A [`SigningKey`] whose operations are performed by a
/// [`KeyOperationHandler`].
pub struct HandlerSigningKey {
    handler: Arc<dyn KeyOperationHandler>,
    algorithm: KeyAlgorithm,
}

impl HandlerSigningKey {
    /// Take over one reference to `handler`, which must own the private
    /// key matching a certificate with public key `algorithm`.
    pub fn new(handler: Arc<dyn KeyOperationHandler>, algorithm: KeyAlgorithm) -> Self {
        Self { handler, algorithm }
    }

    /// The handler behind this key.
    pub fn handler(&self) -> &Arc<dyn KeyOperationHandler> {
        &self.handler
    }
}

impl fmt::Debug for HandlerSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSigningKey")
            .field("handler", &self.handler)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl SigningKey for HandlerSigningKey {
    fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
        let scheme = self.algorithm.choose(offered)?;
        Some(Box::new(HandlerSigner {
            handler: Arc::clone(&self.handler),
            scheme,
        }))
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm.signature_algorithm()
    }
}

#[derive(Debug)]
struct HandlerSigner {
    handler: Arc<dyn KeyOperationHandler>,
    scheme: SignatureScheme,
}

impl Signer for HandlerSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, rustls::Error> {
        Ok(self.handler.sign(self.scheme, message)?)
    }

    fn scheme(&self) -> SignatureScheme {
        self.scheme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[derive(Debug)]
    struct Refuses;

    impl KeyOperationHandler for Refuses {
        fn sign(&self, _: SignatureScheme, _: &[u8]) -> Result<Vec<u8>, KeyOperationError> {
            Err(KeyOperationError::Failed("token unplugged".into()))
        }
    }

    #[test]
    fn signs_through_handler() {
        let handler: Arc<dyn KeyOperationHandler> = Arc::new(testdata::LocalKeyHandler::user1());
        let key = HandlerSigningKey::new(handler, KeyAlgorithm::EcdsaP256);
        assert_eq!(key.algorithm(), SignatureAlgorithm::ECDSA);
        let signer = key
            .choose_scheme(&[SignatureScheme::ECDSA_NISTP256_SHA256])
            .expect("scheme");
        assert_eq!(signer.scheme(), SignatureScheme::ECDSA_NISTP256_SHA256);
        assert!(!signer.sign(b"transcript").unwrap().is_empty());
    }

    #[test]
    fn no_common_scheme() {
        let key = HandlerSigningKey::new(Arc::new(Refuses), KeyAlgorithm::EcdsaP256);
        assert!(key.choose_scheme(&[SignatureScheme::RSA_PSS_SHA256]).is_none());
    }

    #[test]
    fn handler_failure_becomes_tls_error() {
        let key = HandlerSigningKey::new(Arc::new(Refuses), KeyAlgorithm::EcdsaP256);
        let signer = key
            .choose_scheme(&[SignatureScheme::ECDSA_NISTP256_SHA256])
            .unwrap();
        assert!(matches!(
            signer.sign(b"transcript"),
            Err(rustls::Error::General(m)) if m.contains("token unplugged")
        ));
    }

    #[test]
    fn decrypt_unsupported_by_default() {
        assert!(matches!(
            Refuses.decrypt(b"x"),
            Err(KeyOperationError::Unsupported)
        ));
    }
}
