//! Referential-integrity errors.

use hd_document::ReferenceField;

/// A broken cross-reference found while resolving a drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferentialIntegrityError {
    /// An entity points at a uid that exists nowhere in the drawing.
    DanglingReference {
        from: String,
        missing: String,
        field: ReferenceField,
    },

    /// The same uid appears more than once across levels and the shared pool.
    DuplicateId { uid: String, scopes: Vec<String> },

    /// The parent relation loops. Uids are listed starting from the smallest.
    CycleDetected { uids: Vec<String> },
}

impl ReferentialIntegrityError {
    /// Uids this error is about.
    pub fn uids(&self) -> Vec<&str> {
        match self {
            ReferentialIntegrityError::DanglingReference { from, missing, .. } => {
                vec![from.as_str(), missing.as_str()]
            }
            ReferentialIntegrityError::DuplicateId { uid, .. } => vec![uid.as_str()],
            ReferentialIntegrityError::CycleDetected { uids } => {
                uids.iter().map(String::as_str).collect()
            }
        }
    }
}

impl std::fmt::Display for ReferentialIntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferentialIntegrityError::DanglingReference {
                from,
                missing,
                field,
            } => {
                write!(
                    f,
                    "Entity {} refers to non-existent {} via {}",
                    from, missing, field
                )
            }
            ReferentialIntegrityError::DuplicateId { uid, scopes } => {
                write!(f, "Uid {} is used {} times ({})", uid, scopes.len(), scopes.join(", "))
            }
            ReferentialIntegrityError::CycleDetected { uids } => {
                let head = uids.first().map_or("", String::as_str);
                write!(f, "Parent cycle: {} -> {}", uids.join(" -> "), head)
            }
        }
    }
}

impl std::error::Error for ReferentialIntegrityError {}
