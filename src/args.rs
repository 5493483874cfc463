//! Command line flags describing a client TLS context.
//!
//! # Command line flags
//!
//! | Flag                         | Default | Meaning                 |
//! |------------------------------|---------|-------------------------|
//! | `--cert-path`                | None    | File containing the PEM-format client certificate chain |
//! | `--key-path`                 | None    | File containing the PEM-format client private key |
//! | `--pkcs12-path`              | None    | PKCS#12 file holding the client certificate and key |
//! | `--pkcs12-password-file`     | None    | File whose contents are the PKCS#12 password |
//! | `--windows-cert-store-path`  | None    | `<location>\<store>\<thumbprint>` of the client certificate |
//! | `--cacert`                   | None    | File of PEM-format trust anchors replacing the platform roots |
//! | `--capath`                   | None    | Directory of PEM-format trust anchors replacing the platform roots |
//! | `--alpn`                     | None    | `;`-separated ALPN protocols, most preferred first |
//! | `--min-tls-version`          | default | Lowest protocol version to negotiate |
//! | `--cipher-pref`              | default | Cipher-suite policy |
//! | `--dangerous-no-verify-peer` | false   | Do not verify the server certificate |

use std::path::PathBuf;

use crate::error::TlsContextError;
use crate::options::{AlpnList, TlsCipherPreference, TlsVersion};
use crate::request::TlsContextRequest;
use crate::sensitive::SensitiveString;

/// Command line arguments for building a [`TlsContextRequest`].
#[derive(clap::Args, Debug, Default)]
#[group(id = "tls_context_args")]
pub struct Args {
    #[arg(long, help = "Path to client TLS certificate chain in PEM format.")]
    cert_path: Option<PathBuf>,

    #[arg(long, help = "Path to client TLS key in PEM format.")]
    key_path: Option<PathBuf>,

    #[arg(long, help = "Path to a PKCS#12 file with the client certificate and key.")]
    pkcs12_path: Option<PathBuf>,

    #[arg(
        long,
        help = "Path to a file containing the PKCS#12 password. Trailing newlines are ignored."
    )]
    pkcs12_password_file: Option<PathBuf>,

    #[arg(long, help = "Client certificate in the platform certificate store.")]
    windows_cert_store_path: Option<String>,

    #[arg(
        long,
        help = "Path to TLS root certificates for verifying servers, in PEM format."
    )]
    cacert: Option<PathBuf>,

    #[arg(
        long,
        help = "Directory of TLS root certificates for verifying servers, in PEM format."
    )]
    capath: Option<PathBuf>,

    #[arg(long, help = "ALPN protocols to offer, separated by ';'.")]
    alpn: Option<AlpnList>,

    #[arg(long, value_enum, default_value_t, help = "Minimum TLS version.")]
    min_tls_version: TlsVersion,

    #[arg(long, value_enum, default_value_t, help = "Cipher-suite policy.")]
    cipher_pref: TlsCipherPreference,

    #[arg(
        long,
        help = "Accept any server certificate. Only for testing against servers with throwaway certificates."
    )]
    dangerous_no_verify_peer: bool,
}

impl TryFrom<Args> for TlsContextRequest {
    type Error = TlsContextError;

    fn try_from(args: Args) -> Result<Self, TlsContextError> {
        let pkcs12_password = args
            .pkcs12_password_file
            .map(|path| {
                let raw = crate::files::read_sensitive(&path)?;
                let text = std::str::from_utf8(raw.expose()).map_err(|_| {
                    TlsContextError::InvalidArgument(format!(
                        "{} is not UTF-8",
                        path.display()
                    ))
                })?;
                Ok::<_, TlsContextError>(SensitiveString::from(text.trim_end_matches(['\r', '\n'])))
            })
            .transpose()?;
        Ok(Self {
            certificate_path: args.cert_path,
            private_key_path: args.key_path,
            pkcs12_path: args.pkcs12_path,
            pkcs12_password,
            windows_cert_store_path: args.windows_cert_store_path,
            ca_file_path: args.cacert,
            ca_dir_path: args.capath,
            verify_peer: !args.dangerous_no_verify_peer,
            alpn_protocols: args
                .alpn
                .map(|a| a.protocols().to_vec())
                .unwrap_or_default(),
            minimum_tls_version: args.min_tls_version,
            cipher_preference: args.cipher_pref,
            ..Self::default()
        })
    }
}
