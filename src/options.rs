//! Global options applied to every configuration regardless of the
//! credential mode: minimum protocol version, cipher preference and ALPN.
//!
//! The numeric values of [`TlsVersion`] and [`TlsCipherPreference`] are
//! stable and are what [`TryFrom<i32>`] range-checks against, so callers
//! holding raw integers (from a foreign boundary or a config file) get
//! [`TlsContextError::InvalidArgument`] instead of a silently wrong policy.

use rustls::crypto::CryptoProvider;
use rustls::{CipherSuite, NamedGroup, SupportedProtocolVersion};
use std::fmt;
use std::str::FromStr;

use crate::error::TlsContextError;

/// Lowest TLS protocol version the client will negotiate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "args", derive(clap::ValueEnum))]
#[repr(i32)]
pub enum TlsVersion {
    /// SSL 3.0
    #[cfg_attr(feature = "args", value(name = "ssl3"))]
    SslV3 = 0,
    /// TLS 1.0
    #[cfg_attr(feature = "args", value(name = "tls1.0"))]
    TlsV1 = 1,
    /// TLS 1.1
    #[cfg_attr(feature = "args", value(name = "tls1.1"))]
    TlsV1_1 = 2,
    /// TLS 1.2
    #[cfg_attr(feature = "args", value(name = "tls1.2"))]
    TlsV1_2 = 3,
    /// TLS 1.3
    #[cfg_attr(feature = "args", value(name = "tls1.3"))]
    TlsV1_3 = 4,
    /// Whatever the TLS backend considers safe.
    #[default]
    #[cfg_attr(feature = "args", value(name = "default"))]
    SystemDefault = 128,
}

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

impl TlsVersion {
    /// Protocol versions enabled by this floor. The backend only
    /// implements TLS 1.2 and 1.3 so every floor at or below 1.2
    /// enables both.
    pub(crate) fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::TlsV1_3 => TLS13_ONLY,
            Self::SslV3 | Self::TlsV1 | Self::TlsV1_1 => {
                log::debug!("minimum version {self:?} raised to TLS 1.2");
                rustls::ALL_VERSIONS
            }
            Self::TlsV1_2 | Self::SystemDefault => rustls::ALL_VERSIONS,
        }
    }
}

impl TryFrom<i32> for TlsVersion {
    type Error = TlsContextError;

    fn try_from(v: i32) -> Result<Self, TlsContextError> {
        Ok(match v {
            0 => Self::SslV3,
            1 => Self::TlsV1,
            2 => Self::TlsV1_1,
            3 => Self::TlsV1_2,
            4 => Self::TlsV1_3,
            128 => Self::SystemDefault,
            _ => {
                return Err(TlsContextError::InvalidArgument(format!(
                    "TLS version is out of range: {v}"
                )));
            }
        })
    }
}

/// Named cipher-suite and key-exchange policy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "args", derive(clap::ValueEnum))]
#[repr(i32)]
pub enum TlsCipherPreference {
    /// The backend's default suites and groups.
    #[default]
    SystemDefault = 0,
    /// Retired KMS post-quantum policy.
    KmsPqTlsv1_0_2019_06 = 1,
    /// Retired KMS post-quantum policy using SIKE.
    KmsPqSikeTlsv1_0_2019_11 = 2,
    /// Retired KMS post-quantum policy.
    KmsPqTlsv1_0_2020_02 = 3,
    /// Retired KMS post-quantum policy using SIKE.
    KmsPqSikeTlsv1_0_2020_02 = 4,
    /// Retired KMS post-quantum policy.
    KmsPqTlsv1_0_2020_07 = 5,
    /// Hybrid post-quantum policy allowing TLS 1.0.
    PqTlsv1_0_2021_05 = 6,
    /// Hybrid post-quantum key exchange preferred, TLS 1.2 and up.
    PqTlsv1_2_2024_10 = 7,
    /// Hybrid post-quantum key exchange preferred.
    PqDefault = 8,
    /// TLS 1.2 and up with AES-GCM suites only.
    Tlsv1_2_2025_07 = 9,
}

/// One past the largest defined [`TlsCipherPreference`] value.
pub const CIPHER_PREFERENCE_END_RANGE: i32 = 10;

const AES_GCM_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS13_AES_128_GCM_SHA256,
    CipherSuite::TLS13_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
];

impl TlsCipherPreference {
    fn prefers_post_quantum(self) -> bool {
        matches!(self, Self::PqTlsv1_2_2024_10 | Self::PqDefault)
    }

    /// Whether `provider` can implement this policy.
    pub fn is_supported_by(self, provider: &CryptoProvider) -> bool {
        match self {
            Self::SystemDefault => true,
            Self::PqTlsv1_2_2024_10 | Self::PqDefault => provider
                .kx_groups
                .iter()
                .any(|g| g.name() == NamedGroup::X25519MLKEM768),
            Self::Tlsv1_2_2025_07 => provider
                .cipher_suites
                .iter()
                .any(|cs| AES_GCM_SUITES.contains(&cs.suite())),
            Self::KmsPqTlsv1_0_2019_06
            | Self::KmsPqSikeTlsv1_0_2019_11
            | Self::KmsPqTlsv1_0_2020_02
            | Self::KmsPqSikeTlsv1_0_2020_02
            | Self::KmsPqTlsv1_0_2020_07
            | Self::PqTlsv1_0_2021_05 => false,
        }
    }

    /// Derive a provider restricted or reordered according to this policy.
    pub(crate) fn apply(self, base: &CryptoProvider) -> Result<CryptoProvider, TlsContextError> {
        if !self.is_supported_by(base) {
            return Err(TlsContextError::UnsupportedPlatform(format!(
                "cipher preference {self:?} is not implemented by this TLS backend"
            )));
        }
        let mut provider = base.clone();
        if self.prefers_post_quantum() {
            provider
                .kx_groups
                .sort_by_key(|g| g.name() != NamedGroup::X25519MLKEM768);
        }
        if self == Self::Tlsv1_2_2025_07 {
            provider
                .cipher_suites
                .retain(|cs| AES_GCM_SUITES.contains(&cs.suite()));
        }
        Ok(provider)
    }
}

impl TryFrom<i32> for TlsCipherPreference {
    type Error = TlsContextError;

    fn try_from(v: i32) -> Result<Self, TlsContextError> {
        Ok(match v {
            0 => Self::SystemDefault,
            1 => Self::KmsPqTlsv1_0_2019_06,
            2 => Self::KmsPqSikeTlsv1_0_2019_11,
            3 => Self::KmsPqTlsv1_0_2020_02,
            4 => Self::KmsPqSikeTlsv1_0_2020_02,
            5 => Self::KmsPqTlsv1_0_2020_07,
            6 => Self::PqTlsv1_0_2021_05,
            7 => Self::PqTlsv1_2_2024_10,
            8 => Self::PqDefault,
            9 => Self::Tlsv1_2_2025_07,
            _ => {
                return Err(TlsContextError::InvalidArgument(format!(
                    "TlsCipherPreference is out of range: {v}"
                )));
            }
        })
    }
}

/// Whether the TLS backend supports ALPN negotiation at all.
pub fn is_alpn_available() -> bool {
    true
}

/// Whether the cipher preference with numeric value `pref` can be
/// implemented by the process default crypto provider.
///
/// # Errors
///
/// [`TlsContextError::InvalidArgument`] if `pref` is not a defined
/// [`TlsCipherPreference`] value.
pub fn is_cipher_preference_supported(pref: i32) -> Result<bool, TlsContextError> {
    let pref = TlsCipherPreference::try_from(pref)?;
    Ok(pref.is_supported_by(&crate::crypto_provider::default_provider()))
}

/// Separator used by the engine's string form of an ALPN list.
pub const ALPN_SEPARATOR: char = ';';

/// Ordered list of ALPN protocol identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlpnList(Vec<String>);

impl AlpnList {
    /// Validate and copy `protocols`, keeping their order.
    pub fn new<I, S>(protocols: I) -> Result<Self, TlsContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let protocols = protocols.into_iter().map(Into::into).collect::<Vec<_>>();
        for p in &protocols {
            if p.is_empty() {
                return Err(TlsContextError::InvalidArgument(
                    "empty ALPN protocol identifier".into(),
                ));
            }
            if p.contains(ALPN_SEPARATOR) {
                return Err(TlsContextError::InvalidArgument(format!(
                    "ALPN protocol identifier {p:?} contains the list separator {ALPN_SEPARATOR:?}"
                )));
            }
            if p.len() > 255 {
                return Err(TlsContextError::InvalidArgument(format!(
                    "ALPN protocol identifier of {} bytes is too long",
                    p.len()
                )));
            }
        }
        Ok(Self(protocols))
    }

    /// The identifiers in preference order.
    pub fn protocols(&self) -> &[String] {
        &self.0
    }

    /// No ALPN will be offered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers as the byte strings the handshake carries.
    pub(crate) fn to_wire(&self) -> Vec<Vec<u8>> {
        self.0.iter().map(|p| p.as_bytes().to_vec()).collect()
    }
}

impl fmt::Display for AlpnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for p in &self.0 {
            if !first {
                write!(f, "{ALPN_SEPARATOR}")?;
            }
            first = false;
            f.write_str(p)?;
        }
        Ok(())
    }
}

impl FromStr for AlpnList {
    type Err = TlsContextError;

    fn from_str(s: &str) -> Result<Self, TlsContextError> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        Self::new(s.split(ALPN_SEPARATOR))
    }
}
