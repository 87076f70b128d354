//! # License Keys
//!
//! Key normalization and the license record shared with cava-db.
//!
//! ## Activation Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "abcd-1234 efgh-5678 " ──parse──► "ABCD-1234-EFGH-5678"                │
//! │                                                                         │
//! │  Stored status      Device            Result                            │
//! │  ─────────────      ──────            ──────                            │
//! │  (no row)           any               NotFound                          │
//! │  Revoked            any               LicenseRevoked                    │
//! │  Active             other device      AlreadyActivated                  │
//! │  Active             same device       Ok (nothing changes)              │
//! │  Available          any               Ok, now Active for this device    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

// =============================================================================
// License Key
// =============================================================================

/// A normalized `XXXX-XXXX-XXXX-XXXX` key (uppercase ASCII alphanumerics).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Normalizes and validates a key as typed by the user.
    ///
    /// Surrounding whitespace and inner spaces are dropped, letters are
    /// uppercased, and a key typed without dashes is accepted.
    ///
    /// ```rust
    /// use cava_core::license::LicenseKey;
    ///
    /// let key = LicenseKey::parse(" abcd-1234 efgh5678").unwrap();
    /// assert_eq!(key.as_str(), "ABCD-1234-EFGH-5678");
    /// assert!(LicenseKey::parse("ABCD-1234").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if compact.is_empty() {
            return Err(CoreError::InvalidLicense("license key is required".to_string()));
        }
        if compact.len() != GROUPS * GROUP_LEN
            || !compact.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CoreError::InvalidLicense(
                "expected format XXXX-XXXX-XXXX-XXXX".to_string(),
            ));
        }

        let groups: Vec<&str> = (0..GROUPS)
            .map(|i| &compact[i * GROUP_LEN..(i + 1) * GROUP_LEN])
            .collect();
        Ok(LicenseKey(groups.join("-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last group only, for logs and the settings screen.
    pub fn masked(&self) -> String {
        let tail = self.0.rsplit('-').next().unwrap_or_default();
        format!("****-****-****-{}", tail)
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LicenseKey::parse(s)
    }
}

impl TryFrom<String> for LicenseKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LicenseKey::parse(&value)
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.0
    }
}

// =============================================================================
// License Record
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    #[default]
    Available,
    Active,
    Revoked,
}

/// A license as stored, bound to at most one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct License {
    #[ts(as = "String")]
    pub key: LicenseKey,
    pub organization_id: String,
    pub device_id: Option<String>,
    pub status: LicenseStatus,
    #[ts(as = "Option<String>")]
    pub activated_at: Option<DateTime<Utc>>,
}

impl License {
    /// Active and bound to `device_id`.
    pub fn is_active_on(&self, device_id: &str) -> bool {
        self.status == LicenseStatus::Active && self.device_id.as_deref() == Some(device_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(
            LicenseKey::parse("abcd-efgh-1234-5678").unwrap().as_str(),
            "ABCD-EFGH-1234-5678"
        );
        assert_eq!(
            LicenseKey::parse("  AB CD-EFGH-12 34-5678\n").unwrap().as_str(),
            "ABCD-EFGH-1234-5678"
        );
        assert_eq!(
            LicenseKey::parse("abcdefgh12345678").unwrap().as_str(),
            "ABCD-EFGH-1234-5678"
        );
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(LicenseKey::parse("").is_err());
        assert!(LicenseKey::parse("   ").is_err());
        assert!(LicenseKey::parse("ABCD-EFGH-1234").is_err());
        assert!(LicenseKey::parse("ABCD-EFGH-1234-56789").is_err());
        assert!(LicenseKey::parse("ABCD-EFGH-1234-567*").is_err());
        assert!(matches!(
            LicenseKey::parse("ÁBCD-EFGH-1234-5678"),
            Err(CoreError::InvalidLicense(_))
        ));
    }

    #[test]
    fn test_masked() {
        let key: LicenseKey = "abcd-efgh-1234-5678".parse().unwrap();
        assert_eq!(key.masked(), "****-****-****-5678");
    }

    #[test]
    fn test_serde_goes_through_parse() {
        let key: LicenseKey = serde_json::from_str("\"abcd-efgh-1234-5678\"").unwrap();
        assert_eq!(key.to_string(), "ABCD-EFGH-1234-5678");
        assert!(serde_json::from_str::<LicenseKey>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"ABCD-EFGH-1234-5678\"");
    }

    #[test]
    fn test_is_active_on() {
        let license = License {
            key: LicenseKey::parse("ABCD-EFGH-1234-5678").unwrap(),
            organization_id: "org-1".to_string(),
            device_id: Some("till-1".to_string()),
            status: LicenseStatus::Active,
            activated_at: Some(Utc::now()),
        };
        assert!(license.is_active_on("till-1"));
        assert!(!license.is_active_on("till-2"));
        assert!(!License {
            status: LicenseStatus::Revoked,
            ..license
        }
        .is_active_on("till-1"));
    }
}
