//! Cookie consent record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted, partial set of consent flags.
///
/// Every flag is optional: a visitor who only answered the analytics
/// question has `marketing: None`. Unknown fields written by other clients
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub necessary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
    /// "Accept all" shortcut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Consent {
    /// Whether analytics may be initialised.
    ///
    /// Only an explicit `true` on `analytics` or `all` counts.
    #[must_use]
    pub const fn allows_analytics(&self) -> bool {
        matches!(self.analytics, Some(true)) || matches!(self.all, Some(true))
    }

    /// Overlay the flags set in `partial` and stamp the update time.
    #[must_use]
    pub fn merge(self, partial: &Self, now: DateTime<Utc>) -> Self {
        Self {
            necessary: partial.necessary.or(self.necessary),
            analytics: partial.analytics.or(self.analytics),
            marketing: partial.marketing.or(self.marketing),
            all: partial.all.or(self.all),
            updated_at: Some(now),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allows_analytics_requires_explicit_true() {
        assert!(!Consent::default().allows_analytics());

        let denied: Consent = serde_json::from_value(json!({"analytics": false})).unwrap();
        assert!(!denied.allows_analytics());

        let granted: Consent = serde_json::from_value(json!({"analytics": true})).unwrap();
        assert!(granted.allows_analytics());

        let all: Consent = serde_json::from_value(json!({"all": true, "analytics": false})).unwrap();
        assert!(all.allows_analytics());
    }

    #[test]
    fn test_merge_keeps_unset_flags_and_stamps_time() {
        let existing = Consent {
            marketing: Some(true),
            ..Consent::default()
        };
        let partial = Consent {
            analytics: Some(true),
            ..Consent::default()
        };
        let now = Utc::now();

        let merged = existing.merge(&partial, now);

        assert_eq!(merged.marketing, Some(true));
        assert_eq!(merged.analytics, Some(true));
        assert_eq!(merged.updated_at, Some(now));
    }

    #[test]
    fn test_serializes_camel_case_and_ignores_unknown_fields() {
        let consent: Consent = serde_json::from_value(json!({
            "analytics": true,
            "updatedAt": "2024-05-01T10:00:00Z",
            "version": 3
        }))
        .unwrap();

        let value = serde_json::to_value(&consent).unwrap();
        assert_eq!(value["analytics"], json!(true));
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("marketing").is_none());
    }
}
