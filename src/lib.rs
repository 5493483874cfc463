//! Client TLS context configuration
//!
//! A [`TlsContextRequest`] gathers every way a client identity can be
//! supplied (certificate and key in memory or on disk, a PKCS#11 token, a
//! caller-implemented [`KeyOperationHandler`], a PKCS#12 container or the
//! platform certificate store) together with trust-store and protocol
//! options. [`TlsContextConfigBuilder::build`] picks exactly one
//! [`CredentialMode`] in a fixed priority order (see [`selection`]),
//! validates and copies everything it needs, and returns an immutable
//! [`TlsContextConfig`]. That config hands out independent
//! [`rustls::ClientConfig`]s for as many connections as required.
//!
//! Secret material (private keys, PINs, passwords) is only ever held in
//! [`SensitiveBytes`] and [`SensitiveString`], which wipe their memory on
//! drop and never print their contents.
//!
//! ```no_run
//! use tls_context_config::{TlsContextConfigBuilder, TlsContextRequest};
//!
//! let request = TlsContextRequest::default()
//!     .with_cert_and_key_paths("client.pem", "client.key")
//!     .with_ca_file("ca.pem")
//!     .with_alpn_protocols(["h2"]);
//! let config = TlsContextConfigBuilder::new().build(&request)?;
//! let client_config = config.client_config()?;
//! # Ok::<(), tls_context_config::TlsContextError>(())
//! ```

#![warn(missing_docs)]

#[cfg(feature = "args")]
pub mod args;
mod builder;
pub mod cert_store;
pub mod certificate;
mod config;
pub mod crypto_provider;
mod error;
mod files;
pub mod key_operation;
pub mod options;
pub mod pkcs11;
mod pkcs12;
mod request;
pub mod selection;
mod sensitive;
#[cfg(test)]
mod testdata;
pub mod trust;

#[cfg(feature = "args")]
pub use args::Args;
pub use builder::TlsContextConfigBuilder;
pub use config::{Credentials, TlsContextConfig};
pub use error::{KeyOperationError, Pkcs11Error, TlsContextError};
pub use key_operation::KeyOperationHandler;
pub use options::{
    AlpnList, TlsCipherPreference, TlsVersion, is_alpn_available, is_cipher_preference_supported,
};
pub use request::{CustomKeyOperationOptions, TlsContextRequest};
pub use selection::CredentialMode;
pub use sensitive::{SensitiveBytes, SensitiveString};
