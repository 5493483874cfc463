//! Client identities loaded from password-protected PKCS#12 containers.

use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use std::path::Path;
use std::sync::Arc;

use crate::error::TlsContextError;
use crate::sensitive::SensitiveString;

/// Read the container at `path`, decrypt it with `password` and pair its
/// first private key with that key's certificate chain.
#[cfg(feature = "pkcs12")]
pub(crate) fn load(
    path: &Path,
    password: &SensitiveString,
    provider: &CryptoProvider,
) -> Result<Arc<CertifiedKey>, TlsContextError> {
    use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use zeroize::Zeroizing;

    let data = crate::files::read_sensitive(path)?;
    let store = p12_keystore::KeyStore::from_pkcs12(data.expose(), password.expose())
        .map_err(|e| {
            TlsContextError::InvalidCredentials(format!("PKCS#12 {}: {e}", path.display()))
        })?;
    let (alias, entry) = store.private_key_chain().ok_or_else(|| {
        TlsContextError::InvalidCredentials(format!(
            "no private key in PKCS#12 {}",
            path.display()
        ))
    })?;
    log::debug!("Using PKCS#12 entry {alias:?} from {}", path.display());
    let chain = entry
        .chain()
        .iter()
        .map(|c| CertificateDer::from(c.as_der().to_vec()))
        .collect::<Vec<_>>();
    if chain.is_empty() {
        return Err(TlsContextError::InvalidCredentials(format!(
            "no certificate for the private key in PKCS#12 {}",
            path.display()
        )));
    }
    let key = Zeroizing::new(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        entry.key().to_vec(),
    )));
    crate::certificate::certified_key(provider, chain, &key)
}

#[cfg(not(feature = "pkcs12"))]
pub(crate) fn load(
    _: &Path,
    _: &SensitiveString,
    _: &CryptoProvider,
) -> Result<Arc<CertifiedKey>, TlsContextError> {
    Err(TlsContextError::UnsupportedPlatform(
        "built without PKCS#12 support".into(),
    ))
}

#[cfg(all(test, feature = "pkcs12"))]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn loads_user1() {
        let d = testdata::CertAndKeyFiles::user1().unwrap();
        let path = d.write("id.p12", testdata::USER1_P12).unwrap();
        let provider = crate::crypto_provider::default_provider();
        let ck = load(
            &path,
            &testdata::USER1_P12_PASSWORD.into(),
            &provider,
        )
        .unwrap();
        let want = crate::certificate::parse_chain(testdata::USER1_CERT).unwrap();
        assert_eq!(ck.cert[0], want[0]);
        assert!(ck.end_entity_cert().is_ok());
    }

    #[test]
    fn wrong_password() {
        let d = testdata::CertAndKeyFiles::user1().unwrap();
        let path = d.write("id.p12", testdata::USER1_P12).unwrap();
        let provider = crate::crypto_provider::default_provider();
        assert!(matches!(
            load(&path, &"wrong".into(), &provider),
            Err(TlsContextError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn missing_container() {
        let d = tempfile::tempdir().unwrap();
        let provider = crate::crypto_provider::default_provider();
        assert!(matches!(
            load(&d.path().join("id.p12"), &"x".into(), &provider),
            Err(TlsContextError::FileNotFound(_))
        ));
    }
}
