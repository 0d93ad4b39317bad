//! Barrier configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the primary signal treats an arrival without a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum EmptyPayloadPolicy {
    /// An empty primary payload means "not ready yet": the slot stays pending.
    #[default]
    Withhold,
    /// An empty primary payload still counts as arrived; the listener may
    /// receive `None`.
    Arrive,
}

/// Configuration for a join barrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct BarrierConfig {
    /// Treatment of `None` payloads on the primary slot
    pub empty_payload: EmptyPayloadPolicy,
    /// Name used in logs and status snapshots
    pub label: Option<String>,
}

impl BarrierConfig {
    /// Parse a config document. Missing fields take their defaults.
    ///
    /// ```
    /// use join_barrier::{BarrierConfig, EmptyPayloadPolicy};
    /// let cfg = BarrierConfig::from_json(r#"{"empty_payload":"arrive"}"#).unwrap();
    /// assert_eq!(cfg.empty_payload, EmptyPayloadPolicy::Arrive);
    /// assert!(cfg.label.is_none());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_empty_payload(mut self, policy: EmptyPayloadPolicy) -> Self {
        self.empty_payload = policy;
        self
    }
}
