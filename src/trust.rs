//! Trust anchors used to verify the server.
//!
//! Unless overridden, the platform's trust store is used (falling back to
//! the bundled Mozilla roots if the platform store cannot be read). An
//! override replaces it entirely, either with an inline PEM bundle or
//! with certificates loaded from a CA file and/or a CA directory.

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::TlsContextError;
use crate::files;

/// CA file and/or CA directory. At least one is always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaPaths {
    ca_file: Option<PathBuf>,
    ca_dir: Option<PathBuf>,
}

impl CaPaths {
    /// Returns `None` if neither path is given.
    pub fn new(ca_file: Option<PathBuf>, ca_dir: Option<PathBuf>) -> Option<Self> {
        if ca_file.is_none() && ca_dir.is_none() {
            None
        } else {
            Some(Self { ca_file, ca_dir })
        }
    }

    /// File holding PEM CA certificates.
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// Directory whose files hold PEM CA certificates.
    pub fn ca_dir(&self) -> Option<&Path> {
        self.ca_dir.as_deref()
    }
}

/// Replacement for the default trust store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrustStoreOverride {
    /// PEM text holding one or more CA certificates.
    InlineCaBundle(Vec<u8>),
    /// CA certificates read from disk.
    FilePaths(CaPaths),
}

fn parse_bundle(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, std::io::Error> {
    rustls_pemfile::certs(&mut Cursor::new(pem)).collect()
}

fn add_all(roots: &mut RootCertStore, certs: Vec<CertificateDer<'static>>, origin: &str) {
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        log::warn!("Ignored {ignored} unusable CA certificates from {origin}");
    }
    log::debug!("Loaded {added} CA certificates from {origin}");
}

/// Like [`add_all`] but any certificate that does not parse fails the load.
fn add_every(
    roots: &mut RootCertStore,
    certs: Vec<CertificateDer<'static>>,
    origin: &str,
) -> Result<(), TlsContextError> {
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        return Err(TlsContextError::InvalidTrustStore(format!(
            "{ignored} unusable CA certificates in {origin}"
        )));
    }
    log::debug!("Loaded {added} CA certificates from {origin}");
    Ok(())
}

impl TrustStoreOverride {
    /// Parse or read every certificate this override names.
    pub(crate) fn load(&self) -> Result<RootCertStore, TlsContextError> {
        let mut roots = RootCertStore::empty();
        match self {
            Self::InlineCaBundle(pem) => {
                let certs = parse_bundle(pem)
                    .map_err(|e| TlsContextError::InvalidTrustStore(format!("CA bundle: {e}")))?;
                add_every(&mut roots, certs, "inline bundle")?;
            }
            Self::FilePaths(paths) => {
                if let Some(file) = paths.ca_file() {
                    let certs = parse_bundle(&files::read(file)?).map_err(|e| {
                        TlsContextError::InvalidTrustStore(format!("{}: {e}", file.display()))
                    })?;
                    if certs.is_empty() {
                        log::warn!("No root certificates loaded from file {}", file.display());
                    }
                    add_every(&mut roots, certs, &file.display().to_string())?;
                }
                if let Some(dir) = paths.ca_dir() {
                    for path in files::regular_files(dir)? {
                        match files::read(&path).and_then(|pem| {
                            parse_bundle(&pem).map_err(|e| TlsContextError::io(&path, e))
                        }) {
                            Ok(certs) => add_all(&mut roots, certs, &path.display().to_string()),
                            Err(e) => log::warn!("Skipping CA file: {e}"),
                        }
                    }
                }
            }
        }
        if roots.is_empty() {
            return Err(TlsContextError::InvalidTrustStore(
                "no CA certificates found".into(),
            ));
        }
        Ok(roots)
    }
}

/// The platform trust store, or the bundled Mozilla roots if no
/// platform certificate could be loaded.
pub(crate) fn platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        log::warn!("Platform certificate load error: {e}");
    }
    add_all(&mut roots, native.certs, "the platform trust store");
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        log::debug!("Using {} bundled root certificates", roots.len());
    }
    roots
}
