//! Provide access to the process-global default [`CryptoProvider`] if there
//! is one, otherwise the crate-wide default one.

use rustls::crypto::CryptoProvider;
use std::sync::Arc;

/// The process-global default [`CryptoProvider`] if one has been installed,
/// otherwise aws-lc-rs.
pub fn default_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
