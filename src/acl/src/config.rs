//! Registry configuration loading and validation

use crate::error::{AclError, Result};
use crate::policy::{deserialize_lenient, Policy, PolicySettings, PolicyValue, RawPolicy};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Policy configuration of an [`Acl`](crate::Acl) registry
///
/// ```toml
/// default_policy = "DENY"
/// preferred_policy = "ALLOW"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Policy applied when no rule gives a definitive answer
    #[serde(deserialize_with = "deserialize_decisive")]
    pub default_policy: Policy,

    /// Policy favored between equally distant rules and between parents
    #[serde(deserialize_with = "deserialize_decisive")]
    pub preferred_policy: Policy,
}

impl Default for AclConfig {
    fn default() -> Self {
        let settings = PolicySettings::default();
        Self {
            default_policy: settings.default_policy,
            preferred_policy: settings.preferred_policy,
        }
    }
}

/// Interpret one policy field, naming it in the error
fn field_policy(raw: RawPolicy, field: &str) -> Result<Policy> {
    raw.into_policy().map_err(|e| match e {
        AclError::InvalidPolicyValue(value) => {
            AclError::InvalidPolicyValue(format!("{}: {}", field, value))
        }
        other => other,
    })
}

/// Document shape of [`AclConfig`]; policy values are checked afterwards
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    default_policy: Option<RawPolicy>,
    preferred_policy: Option<RawPolicy>,
}

impl AclConfig {
    /// Parse and validate a TOML document.
    ///
    /// Syntax errors and unknown keys are `Config` errors; a policy other
    /// than `ALLOW` or `DENY` is an `InvalidPolicyValue` error.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(source).map_err(|e| AclError::Config(e.to_string()))?;

        let mut config = AclConfig::default();
        if let Some(policy) = raw.default_policy {
            config.default_policy = field_policy(policy, "default_policy")?;
        }
        if let Some(policy) = raw.preferred_policy {
            config.preferred_policy = field_policy(policy, "preferred_policy")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Both policies must be `ALLOW` or `DENY`
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("default_policy", self.default_policy),
            ("preferred_policy", self.preferred_policy),
        ] {
            if !policy.is_decisive() {
                return Err(AclError::InvalidPolicyValue(format!(
                    "{} should be either ALLOW or DENY, got {}",
                    name, policy
                )));
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> PolicySettings {
        PolicySettings {
            default_policy: self.default_policy,
            preferred_policy: self.preferred_policy,
        }
    }
}

/// Accepts `"ALLOW"`/`"DENY"` in any case, or the numeric codes 0 and 1
fn deserialize_decisive<'de, D>(deserializer: D) -> std::result::Result<Policy, D::Error>
where
    D: Deserializer<'de>,
{
    let policy = deserialize_lenient(deserializer)?;
    if !policy.is_decisive() {
        return Err(serde::de::Error::custom(format!(
            "policy should be either ALLOW or DENY, got {}",
            policy
        )));
    }
    Ok(policy)
}
