//! Counter keys for human-readable identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which family of identifiers a counter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterNamespace {
    Patient,
    Visit,
    Employee,
}

impl CounterNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Visit => "visit",
            Self::Employee => "employee",
        }
    }
}

impl fmt::Display for CounterNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterNamespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "visit" => Ok(Self::Visit),
            "employee" => Ok(Self::Employee),
            _ => Err(format!("Invalid counter namespace: {s}")),
        }
    }
}

/// A `(namespace, scope)` pair identifying one monotonic sequence
///
/// Scopes are `OPD`/`IPD` for patients, `{DEPT}:{TYPE}` for visits and the
/// four-digit year for employees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub namespace: CounterNamespace,
    pub scope: String,
}

impl CounterKey {
    pub fn new(namespace: CounterNamespace, scope: impl Into<String>) -> Self {
        Self {
            namespace,
            scope: scope.into(),
        }
    }

    /// Key used by key-value stores, e.g. `caduceus:counter:visit:ER:OPD`
    pub fn storage_key(&self) -> String {
        format!("caduceus:counter:{}:{}", self.namespace, self.scope)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        let key = CounterKey::new(CounterNamespace::Visit, "ER:OPD");
        assert_eq!(key.storage_key(), "caduceus:counter:visit:ER:OPD");
        assert_eq!(key.to_string(), "visit/ER:OPD");
    }

    #[test]
    fn test_namespace_from_str() {
        assert_eq!("Patient".parse::<CounterNamespace>().unwrap(), CounterNamespace::Patient);
        assert!("invoice".parse::<CounterNamespace>().is_err());
    }
}
