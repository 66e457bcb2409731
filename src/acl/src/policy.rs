//! Policy values and the process-wide policy settings

use crate::error::{AclError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a rule or of a policy query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    /// The action is denied
    Deny,
    /// The action is allowed
    Allow,
    /// Disables inheritance from parent entities; carries no role or action
    NoInherit,
    /// Explicit marker deferring to inheritance; never matched
    Inherit,
    /// Result only: no applicable rule gave a definitive answer
    Undefined,
}

impl Policy {
    /// Parse a policy name, trimmed and case-insensitive.
    ///
    /// In `explicit` mode only `ALLOW` and `DENY` are accepted.
    pub fn parse(value: &str, explicit: bool) -> Result<Policy> {
        let normalized = value.trim().to_uppercase();
        let policy = match normalized.as_str() {
            "ALLOW" => Policy::Allow,
            "DENY" => Policy::Deny,
            "NOINHERIT" if !explicit => Policy::NoInherit,
            "INHERIT" if !explicit => Policy::Inherit,
            "UNDEFINED" if !explicit => Policy::Undefined,
            _ => return Err(AclError::InvalidPolicyValue(value.to_string())),
        };
        Ok(policy)
    }

    /// Numeric code used by persisted rule records
    pub fn code(&self) -> i64 {
        match self {
            Policy::Deny => 0,
            Policy::Allow => 1,
            Policy::NoInherit => 2,
            Policy::Inherit => 3,
            Policy::Undefined => 4,
        }
    }

    /// Inverse of [`Policy::code`]
    pub fn from_code(code: i64) -> Result<Policy> {
        match code {
            0 => Ok(Policy::Deny),
            1 => Ok(Policy::Allow),
            2 => Ok(Policy::NoInherit),
            3 => Ok(Policy::Inherit),
            4 => Ok(Policy::Undefined),
            other => Err(AclError::InvalidPolicyValue(other.to_string())),
        }
    }

    /// `ALLOW` or `DENY`
    pub fn is_decisive(&self) -> bool {
        matches!(self, Policy::Allow | Policy::Deny)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Deny => "DENY",
            Policy::Allow => "ALLOW",
            Policy::NoInherit => "NOINHERIT",
            Policy::Inherit => "INHERIT",
            Policy::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self> {
        Policy::parse(s, false)
    }
}

/// Anything that can be turned into a [`Policy`]: the enum itself, a
/// policy name or a numeric code.
pub trait PolicyValue {
    fn into_policy(self) -> Result<Policy>;
}

impl PolicyValue for Policy {
    fn into_policy(self) -> Result<Policy> {
        Ok(self)
    }
}

impl PolicyValue for &str {
    fn into_policy(self) -> Result<Policy> {
        Policy::parse(self, false)
    }
}

impl PolicyValue for String {
    fn into_policy(self) -> Result<Policy> {
        Policy::parse(&self, false)
    }
}

impl PolicyValue for i64 {
    fn into_policy(self) -> Result<Policy> {
        Policy::from_code(self)
    }
}

/// Require `ALLOW` or `DENY`, naming the setting in the error
pub(crate) fn decisive(value: impl PolicyValue, setting: &str) -> Result<Policy> {
    let policy = value.into_policy()?;
    if !policy.is_decisive() {
        return Err(AclError::InvalidPolicyValue(format!(
            "{} policy should be either ALLOW or DENY, got {}",
            setting, policy
        )));
    }
    Ok(policy)
}

/// A policy as written in a document: its name or its numeric code
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawPolicy {
    Name(String),
    Code(i64),
}

impl PolicyValue for RawPolicy {
    fn into_policy(self) -> Result<Policy> {
        match self {
            RawPolicy::Name(name) => Policy::parse(&name, false),
            RawPolicy::Code(code) => Policy::from_code(code),
        }
    }
}

/// Deserialize a policy from its name (any case) or its numeric code
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> std::result::Result<Policy, D::Error>
where
    D: Deserializer<'de>,
{
    RawPolicy::deserialize(deserializer)?
        .into_policy()
        .map_err(serde::de::Error::custom)
}

/// Snapshot of the default and preferred policy taken at the start of a
/// query. Both are always `ALLOW` or `DENY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySettings {
    /// Applied when resolution yields `UNDEFINED`
    pub default_policy: Policy,
    /// Wins ties between equally distant rules and between parent entities
    pub preferred_policy: Policy,
}

impl PolicySettings {
    /// Map `UNDEFINED` to the default policy
    pub fn finalize(&self, policy: Policy) -> Policy {
        if policy == Policy::Undefined {
            self.default_policy
        } else {
            policy
        }
    }
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            default_policy: Policy::Deny,
            preferred_policy: Policy::Allow,
        }
    }
}
