//! Client identities whose private key lives on a PKCS#11 token.
//!
//! The builder hands a [`Pkcs11Selection`] to a [`Pkcs11Provider`], which
//! resolves it into a [`Pkcs11Handle`]: a signing key bound to an open
//! token session. The handle is owned by the configuration and released
//! (session closed, module finalised) when the configuration is dropped
//! or when a later construction step fails.
//!
//! With the `pkcs11` feature, [`CryptokiProvider`] implements the
//! provider on top of the `cryptoki` crate.

use rustls::sign::SigningKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::certificate::KeyAlgorithm;
use crate::error::Pkcs11Error;
use crate::sensitive::SensitiveString;

/// Opaque reference to a private key on a token.
pub type Pkcs11Handle = Arc<dyn SigningKey>;

/// Which module, token and key to use, and the certificate that goes with
/// the key.
#[derive(Clone, Debug, Default)]
pub struct Pkcs11Selection {
    /// Path of the PKCS#11 module (shared library).
    pub library_path: PathBuf,
    /// PIN for a user login. No login is attempted when absent.
    pub user_pin: Option<SensitiveString>,
    /// Slot to use. If absent the slot is chosen by `token_label`, or the
    /// first slot with a token.
    pub slot_id: Option<u64>,
    /// Label of the token to use.
    pub token_label: Option<String>,
    /// Label of the private key object. If absent the first private key
    /// on the token is used.
    pub private_key_object_label: Option<String>,
    /// PEM certificate chain for the key.
    pub certificate_contents: Option<Vec<u8>>,
    /// File holding the PEM certificate chain for the key.
    pub certificate_path: Option<PathBuf>,
}

impl Pkcs11Selection {
    /// Select keys from the module at `library_path`.
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            ..Self::default()
        }
    }

    /// Log in with `pin`.
    pub fn with_user_pin(mut self, pin: impl Into<SensitiveString>) -> Self {
        self.user_pin = Some(pin.into());
        self
    }

    /// Use the token in slot `id`.
    pub fn with_slot_id(mut self, id: u64) -> Self {
        self.slot_id = Some(id);
        self
    }

    /// Use the token labelled `label`.
    pub fn with_token_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = Some(label.into());
        self
    }

    /// Use the private key object labelled `label`.
    pub fn with_private_key_object_label(mut self, label: impl Into<String>) -> Self {
        self.private_key_object_label = Some(label.into());
        self
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

impl fmt::Display for Pkcs11Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.library_path.display())?;
        if let Some(id) = self.slot_id {
            write!(f, " slot {id}")?;
        }
        if let Some(ref label) = self.token_label {
            write!(f, " token {label:?}")?;
        }
        if let Some(ref label) = self.private_key_object_label {
            write!(f, " key {label:?}")?;
        }
        Ok(())
    }
}

/// Resolves a [`Pkcs11Selection`] into a usable key.
pub trait Pkcs11Provider: Send + Sync {
    /// Open the selected token and find the selected key, which belongs to
    /// a certificate whose public key is of type `algorithm`.
    fn open(
        &self,
        selection: &Pkcs11Selection,
        algorithm: KeyAlgorithm,
    ) -> Result<Pkcs11Handle, Pkcs11Error>;
}

#[cfg(feature = "pkcs11")]
pub use backend::CryptokiProvider;

#[cfg(feature = "pkcs11")]
mod backend {
    use cryptoki::context::{CInitializeArgs, Pkcs11};
    use cryptoki::mechanism::rsa::{PkcsMgfType, PkcsPssParams};
    use cryptoki::mechanism::{Mechanism, MechanismType};
    use cryptoki::object::{Attribute, ObjectClass, ObjectHandle};
    use cryptoki::session::{Session, UserType};
    use cryptoki::slot::Slot;
    use cryptoki::types::AuthPin;
    use rustls::sign::{Signer, SigningKey};
    use rustls::{SignatureAlgorithm, SignatureScheme};
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use super::{Pkcs11Handle, Pkcs11Provider, Pkcs11Selection};
    use crate::certificate::KeyAlgorithm;
    use crate::error::Pkcs11Error;

    /// [`Pkcs11Provider`] that loads the module named by the selection
    /// with `cryptoki`.
    #[derive(Debug, Default)]
    pub struct CryptokiProvider;

    fn find_slot(context: &Pkcs11, selection: &Pkcs11Selection) -> Result<Slot, Pkcs11Error> {
        let slots = context
            .get_slots_with_token()
            .map_err(|e| Pkcs11Error::Backend(format!("Failed to get PKCS#11 slots: {e}")))?;
        for slot in slots {
            if let Some(id) = selection.slot_id {
                if slot.id() != id {
                    continue;
                }
            }
            if let Some(ref want) = selection.token_label {
                let info = context
                    .get_token_info(slot)
                    .map_err(|e| Pkcs11Error::Backend(format!("Failed to get token info: {e}")))?;
                if info.label().trim_end() != want.as_str() {
                    continue;
                }
            }
            log::debug!("Using PKCS#11 slot {}", slot.id());
            return Ok(slot);
        }
        Err(Pkcs11Error::TokenNotFound(selection.to_string()))
    }

    impl Pkcs11Provider for CryptokiProvider {
        fn open(
            &self,
            selection: &Pkcs11Selection,
            algorithm: KeyAlgorithm,
        ) -> Result<Pkcs11Handle, Pkcs11Error> {
            let context =
                Pkcs11::new(&selection.library_path).map_err(|e| Pkcs11Error::Library {
                    path: selection.library_path.clone(),
                    reason: e.to_string(),
                })?;
            context
                .initialize(CInitializeArgs::OsThreads)
                .map_err(|e| Pkcs11Error::Library {
                    path: selection.library_path.clone(),
                    reason: e.to_string(),
                })?;
            let slot = find_slot(&context, selection)?;
            let session = context
                .open_ro_session(slot)
                .map_err(|e| Pkcs11Error::Backend(format!("Failed to open session: {e}")))?;
            if let Some(ref pin) = selection.user_pin {
                let auth_pin = AuthPin::new(pin.expose().to_owned().into());
                session
                    .login(UserType::User, Some(&auth_pin))
                    .map_err(|e| Pkcs11Error::Login(e.to_string()))?;
            }
            let mut template = vec![Attribute::Class(ObjectClass::PRIVATE_KEY)];
            if let Some(ref label) = selection.private_key_object_label {
                template.push(Attribute::Label(label.as_bytes().to_vec()));
            }
            let key = session
                .find_objects(&template)
                .map_err(|e| Pkcs11Error::Backend(format!("Failed to find objects: {e}")))?
                .first()
                .copied()
                .ok_or_else(|| Pkcs11Error::KeyNotFound(selection.to_string()))?;
            Ok(Arc::new(TokenKey(Arc::new(TokenSession {
                session: Mutex::new(session),
                key,
                algorithm,
                _context: context,
            }))))
        }
    }

    struct TokenSession {
        session: Mutex<Session>,
        key: ObjectHandle,
        algorithm: KeyAlgorithm,
        // Dropped after the session, finalising the module.
        _context: Pkcs11,
    }

    impl fmt::Debug for TokenSession {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "TokenSession {{ key: {:?}, .. }}", self.key)
        }
    }

    #[derive(Debug)]
    struct TokenKey(Arc<TokenSession>);

    fn pss(hash_alg: MechanismType, mgf: PkcsMgfType, len: u64) -> PkcsPssParams {
        PkcsPssParams {
            hash_alg,
            mgf,
            s_len: len.into(),
        }
    }

    fn mechanism(scheme: SignatureScheme) -> Option<Mechanism<'static>> {
        Some(match scheme {
            SignatureScheme::RSA_PKCS1_SHA256 => Mechanism::Sha256RsaPkcs,
            SignatureScheme::RSA_PKCS1_SHA384 => Mechanism::Sha384RsaPkcs,
            SignatureScheme::RSA_PKCS1_SHA512 => Mechanism::Sha512RsaPkcs,
            SignatureScheme::RSA_PSS_SHA256 => Mechanism::Sha256RsaPkcsPss(pss(
                MechanismType::SHA256,
                PkcsMgfType::MGF1_SHA256,
                32,
            )),
            SignatureScheme::RSA_PSS_SHA384 => Mechanism::Sha384RsaPkcsPss(pss(
                MechanismType::SHA384,
                PkcsMgfType::MGF1_SHA384,
                48,
            )),
            SignatureScheme::RSA_PSS_SHA512 => Mechanism::Sha512RsaPkcsPss(pss(
                MechanismType::SHA512,
                PkcsMgfType::MGF1_SHA512,
                64,
            )),
            SignatureScheme::ECDSA_NISTP256_SHA256 => Mechanism::EcdsaSha256,
            SignatureScheme::ECDSA_NISTP384_SHA384 => Mechanism::EcdsaSha384,
            _ => return None,
        })
    }

    impl SigningKey for TokenKey {
        fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
            let scheme = self
                .0
                .algorithm
                .schemes()
                .iter()
                .copied()
                .find(|s| offered.contains(s) && mechanism(*s).is_some())?;
            Some(Box::new(TokenSigner {
                token: Arc::clone(&self.0),
                scheme,
            }))
        }

        fn algorithm(&self) -> SignatureAlgorithm {
            self.0.algorithm.signature_algorithm()
        }
    }

    #[derive(Debug)]
    struct TokenSigner {
        token: Arc<TokenSession>,
        scheme: SignatureScheme,
    }

    impl Signer for TokenSigner {
        fn sign(&self, message: &[u8]) -> Result<Vec<u8>, rustls::Error> {
            let mech = mechanism(self.scheme)
                .ok_or_else(|| rustls::Error::General("no PKCS#11 mechanism".into()))?;
            let session = self
                .token
                .session
                .lock()
                .map_err(|_| rustls::Error::General("PKCS#11 session poisoned".into()))?;
            let signature = session
                .sign(&mech, self.token.key, message)
                .map_err(|e| rustls::Error::General(format!("PKCS#11 sign: {e}")))?;
            match self.token.algorithm {
                KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => ecdsa_der(&signature),
                KeyAlgorithm::Rsa | KeyAlgorithm::Ed25519 => Ok(signature),
            }
        }

        fn scheme(&self) -> SignatureScheme {
            self.scheme
        }
    }

    #[derive(asn1::Asn1Read, asn1::Asn1Write)]
    pub(super) struct EcdsaSigValue<'a> {
        pub(super) r: asn1::BigUint<'a>,
        pub(super) s: asn1::BigUint<'a>,
    }

    /// Minimal unsigned INTEGER contents: no redundant leading zeros, and a
    /// zero pad when the top bit is set.
    fn unsigned_integer(magnitude: &[u8]) -> Vec<u8> {
        let start = magnitude
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(magnitude.len().saturating_sub(1));
        let trimmed = &magnitude[start..];
        let mut out = Vec::with_capacity(trimmed.len() + 1);
        if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
            out.push(0);
        }
        out.extend_from_slice(trimmed);
        out
    }

    /// Tokens return ECDSA signatures as raw `r || s`; TLS wants the
    /// DER `Ecdsa-Sig-Value` sequence.
    pub(super) fn ecdsa_der(raw: &[u8]) -> Result<Vec<u8>, rustls::Error> {
        let malformed = || rustls::Error::General("malformed ECDSA signature from token".into());
        let (r, s) = raw.split_at(raw.len() / 2);
        let (r, s) = (unsigned_integer(r), unsigned_integer(s));
        let value = EcdsaSigValue {
            r: asn1::BigUint::new(&r).ok_or_else(malformed)?,
            s: asn1::BigUint::new(&s).ok_or_else(malformed)?,
        };
        asn1::write_single(&value).map_err(|_| malformed())
    }
}
