//! Domain identifier types with validation
//!
//! Newtype wrappers keep the many UUID-keyed entities from being mixed up and
//! validate the human-entered identifiers (department codes, patient ids).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| format!("Invalid {}: {e}", stringify!($name)))
            }
        }
    };
}

uuid_id!(
    /// Inventory item identifier
    ItemId
);
uuid_id!(
    /// Stock movement identifier
    MovementId
);
uuid_id!(
    /// Invoice identifier
    InvoiceId
);
uuid_id!(
    /// Payment identifier
    PaymentId
);
uuid_id!(
    /// Insurance claim identifier
    ClaimId
);
uuid_id!(
    /// Visit identifier
    VisitId
);
uuid_id!(
    /// Employee identifier
    EmployeeId
);
uuid_id!(
    /// Attendance record identifier
    AttendanceId
);
uuid_id!(
    /// Payroll run identifier
    PayrollId
);
uuid_id!(
    /// Audit entry identifier
    AuditId
);

/// Department code newtype wrapper
///
/// Department codes are short upper-case tokens ("ER", "OPD", "PHARM") used in
/// visit numbers and queue keys, so they are normalised on construction.
///
/// # Examples
///
/// ```
/// use caduceus::domain::ids::DepartmentCode;
///
/// let code = DepartmentCode::new("er").unwrap();
/// assert_eq!(code.as_str(), "ER");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepartmentCode(String);

impl DepartmentCode {
    /// Creates a new DepartmentCode, upper-casing the input
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, longer than 16 characters or
    /// contains anything other than ASCII letters, digits and `_`.
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into().trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err("Department code cannot be empty".to_string());
        }
        if code.len() > 16 {
            return Err(format!("Department code too long: {code}"));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("Invalid department code: {code}"));
        }
        Ok(Self(code))
    }

    /// Returns the code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepartmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DepartmentCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DepartmentCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DepartmentCode> for String {
    fn from(code: DepartmentCode) -> Self {
        code.0
    }
}

impl AsRef<str> for DepartmentCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Patient identifier newtype wrapper
///
/// The patient registry is external to this crate; its identifiers are
/// treated as opaque non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(String);

impl PatientId {
    /// Creates a new PatientId
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is blank
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Patient ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the patient ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PatientId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PatientId> for String {
    fn from(id: PatientId) -> Self {
        id.0
    }
}
