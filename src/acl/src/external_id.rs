//! External ids: `"<kind-name>#<key>"` references to records owned by an
//! outside store. Multi-part keys are joined with `-`.

use crate::error::{AclError, Result};
use std::fmt;
use std::str::FromStr;

const KIND_SEPARATOR: char = '#';
const KEY_SEPARATOR: char = '-';

/// A parsed external id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId {
    kind: String,
    key: Vec<String>,
}

impl ExternalId {
    /// Compose an external id from a kind name and key parts
    pub fn new<I, S>(kind: impl Into<String>, key: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = kind.into();
        let key: Vec<String> = key.into_iter().map(Into::into).collect();

        if kind.is_empty() || kind.contains(KIND_SEPARATOR) {
            return Err(AclError::InvalidExternalId(format!(
                "invalid kind name '{}'",
                kind
            )));
        }
        if key.is_empty() {
            return Err(AclError::InvalidExternalId(format!(
                "no key given for kind '{}'",
                kind
            )));
        }
        for part in &key {
            if part.is_empty() || part.contains(KIND_SEPARATOR) || part.contains(KEY_SEPARATOR) {
                return Err(AclError::InvalidExternalId(format!(
                    "invalid key part '{}'",
                    part
                )));
            }
        }

        Ok(Self { kind, key })
    }

    /// Split `<kind>#<key>` into its kind name and key parts
    pub fn parse(id: &str) -> Result<Self> {
        let mut parts = id.split(KIND_SEPARATOR);
        let (Some(kind), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AclError::InvalidExternalId(id.to_string()));
        };
        if kind.is_empty() || key.is_empty() {
            return Err(AclError::InvalidExternalId(id.to_string()));
        }

        Self::new(kind, key.split(KEY_SEPARATOR))
            .map_err(|_| AclError::InvalidExternalId(id.to_string()))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, KIND_SEPARATOR)?;
        for (idx, part) in self.key.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", KEY_SEPARATOR)?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

impl FromStr for ExternalId {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
