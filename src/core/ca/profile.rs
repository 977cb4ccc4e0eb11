//! Trust profiles read from the root CA's signing-config file.

use rcgen::{ExtendedKeyUsagePurpose, KeyUsagePurpose};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_EXPIRY: &str = "8760h";

#[derive(Debug, Deserialize)]
struct SigningConfigDocument {
    signing: SigningPolicy,
}

#[derive(Debug, Deserialize)]
struct SigningPolicy {
    #[serde(default)]
    default: Option<ProfileDocument>,
    #[serde(default)]
    profiles: HashMap<String, ProfileDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    usages: Vec<String>,
    #[serde(default)]
    expiry: Option<String>,
}

/// Key usages and validity applied to every certificate signed under one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningProfile {
    pub name: String,
    pub key_usages: Vec<KeyUsagePurpose>,
    pub extended_key_usages: Vec<ExtendedKeyUsagePurpose>,
    pub validity: Duration,
}

impl SigningProfile {
    /// Select `name` from a signing-config document.
    ///
    /// The empty name selects the `default` policy. Profile fields that are
    /// absent fall back to the `default` policy's values.
    pub fn from_config(content: &str, name: &str) -> Result<Self> {
        let document: SigningConfigDocument = serde_json::from_str(content)
            .map_err(|e| Error::cert_signing_failed(format!("invalid signing config: {}", e), None))?;

        let fallback = document.signing.default.unwrap_or_default();
        let selected = if name.is_empty() {
            fallback.clone()
        } else {
            document
                .signing
                .profiles
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    Error::cert_signing_failed(format!("unknown signing profile '{}'", name), None)
                })?
        };

        let usages = if selected.usages.is_empty() {
            &fallback.usages
        } else {
            &selected.usages
        };
        if usages.is_empty() {
            return Err(Error::cert_signing_failed(
                format!("signing profile '{}' has no usages", name),
                None,
            ));
        }

        let mut key_usages = Vec::new();
        let mut extended_key_usages = Vec::new();
        for usage in usages {
            match parse_usage(usage)? {
                Usage::Key(purpose) => key_usages.push(purpose),
                Usage::Extended(purpose) => extended_key_usages.push(purpose),
            }
        }

        let expiry = selected
            .expiry
            .or(fallback.expiry)
            .unwrap_or_else(|| DEFAULT_EXPIRY.to_string());

        let validity = parse_duration(&expiry)?;
        not_after(time::OffsetDateTime::now_utc(), validity)?;

        Ok(Self {
            name: name.to_string(),
            key_usages,
            extended_key_usages,
            validity,
        })
    }
}

/// End of a validity window starting at `start`. Fails when the end is past
/// the last representable certificate time.
pub fn not_after(start: time::OffsetDateTime, validity: Duration) -> Result<time::OffsetDateTime> {
    time::Duration::try_from(validity)
        .ok()
        .and_then(|validity| start.checked_add(validity))
        .ok_or_else(|| {
            Error::cert_signing_failed(
                format!("expiry of {}s is out of range", validity.as_secs()),
                None,
            )
        })
}

enum Usage {
    Key(KeyUsagePurpose),
    Extended(ExtendedKeyUsagePurpose),
}

fn parse_usage(usage: &str) -> Result<Usage> {
    let usage = match usage.to_ascii_lowercase().as_str() {
        "signing" | "digital signature" => Usage::Key(KeyUsagePurpose::DigitalSignature),
        "content commitment" => Usage::Key(KeyUsagePurpose::ContentCommitment),
        "key encipherment" => Usage::Key(KeyUsagePurpose::KeyEncipherment),
        "key agreement" => Usage::Key(KeyUsagePurpose::KeyAgreement),
        "data encipherment" => Usage::Key(KeyUsagePurpose::DataEncipherment),
        "cert sign" => Usage::Key(KeyUsagePurpose::KeyCertSign),
        "crl sign" => Usage::Key(KeyUsagePurpose::CrlSign),
        "server auth" => Usage::Extended(ExtendedKeyUsagePurpose::ServerAuth),
        "client auth" => Usage::Extended(ExtendedKeyUsagePurpose::ClientAuth),
        "code signing" => Usage::Extended(ExtendedKeyUsagePurpose::CodeSigning),
        "email protection" => Usage::Extended(ExtendedKeyUsagePurpose::EmailProtection),
        "timestamping" => Usage::Extended(ExtendedKeyUsagePurpose::TimeStamping),
        "ocsp signing" => Usage::Extended(ExtendedKeyUsagePurpose::OcspSigning),
        other => {
            return Err(Error::cert_signing_failed(
                format!("unknown usage '{}'", other),
                None,
            ))
        }
    };
    Ok(usage)
}

/// Parse a Go-style duration such as `8760h`, `90m` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::cert_signing_failed(format!("invalid expiry '{}'", input), None);

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }

    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total))
}
