use crate::config::ConfigError;
use crate::config::settings::Settings;
use crate::ocsp::codec::HashAlgorithm;
use std::time::Duration;

/// Upper bound applied to every responder query unless the caller's own deadline is shorter.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevocationCheckMode {
    #[default]
    Disabled,
    Enabled,
    Advisory,
}

#[derive(Debug, Clone)]
pub struct OcspConfig {
    pub check_mode: RevocationCheckMode,
    pub request_timeout: Duration,
    /// Caller deadline applied by the TLS integration around each verification.
    pub verification_timeout: Option<Duration>,
    pub http_timeout: Duration,
    pub connection_timeout: Duration,
    pub hash: HashAlgorithm,
}

impl Default for OcspConfig {
    fn default() -> Self {
        Self {
            check_mode: RevocationCheckMode::Disabled,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verification_timeout: None,
            http_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
            hash: HashAlgorithm::Sha1,
        }
    }
}

impl OcspConfig {
    pub fn from_settings(settings: &dyn Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let check_mode = match settings.get_string("ocsp_check_mode").as_deref() {
            Some("0") | Some("DISABLED") | None => RevocationCheckMode::Disabled,
            Some("1") | Some("ENABLED") => RevocationCheckMode::Enabled,
            Some("2") | Some("ADVISORY") => RevocationCheckMode::Advisory,
            Some(other) => {
                tracing::warn!(target: "ocsp_core::ocsp", "Unknown ocsp_check_mode: {other}, using DISABLED");
                RevocationCheckMode::Disabled
            }
        };
        let request_timeout = positive_duration(
            settings,
            "ocsp_request_timeout_ms",
            Duration::from_millis,
        )?
        .unwrap_or(defaults.request_timeout);
        let verification_timeout = positive_duration(
            settings,
            "ocsp_verification_timeout_ms",
            Duration::from_millis,
        )?;
        let http_timeout = positive_duration(settings, "ocsp_http_timeout", Duration::from_secs)?
            .unwrap_or(defaults.http_timeout);
        let connection_timeout =
            positive_duration(settings, "ocsp_connection_timeout", Duration::from_secs)?
                .unwrap_or(defaults.connection_timeout);
        let hash = match settings.get_string("ocsp_hash_algorithm") {
            None => defaults.hash,
            Some(name) => match name.to_uppercase().as_str() {
                "SHA1" | "SHA-1" => HashAlgorithm::Sha1,
                "SHA256" | "SHA-256" => HashAlgorithm::Sha256,
                _ => {
                    return Err(ConfigError::InvalidArgument(format!(
                        "ocsp_hash_algorithm: unsupported value {name}"
                    )));
                }
            },
        };
        Ok(Self {
            check_mode,
            request_timeout,
            verification_timeout,
            http_timeout,
            connection_timeout,
            hash,
        })
    }
}

fn positive_duration(
    settings: &dyn Settings,
    key: &str,
    unit: fn(u64) -> Duration,
) -> Result<Option<Duration>, ConfigError> {
    match settings.get_int(key) {
        None => Ok(None),
        Some(value) if value > 0 => Ok(Some(unit(value as u64))),
        Some(value) => Err(ConfigError::InvalidArgument(format!(
            "{key} must be positive, got {value}"
        ))),
    }
}
