use thiserror::Error;

/// Primary error type for directory operations.
///
/// Modeled on the LDAP result-code taxonomy: structured variants for the
/// protocol-defined failures, plus the cursor-local failures that never
/// cross the wire. Referral redirections are deliberately *not* an error
/// variant; they travel as an explicit reply so callers can tell a
/// protocol-defined redirection from a failure.
#[derive(Error, Debug)]
pub enum DirectoryError {
    // === Name resolution ===
    /// Target DN does not exist under any partition.
    #[error("no such object: '{dn}'")]
    NoSuchObject { dn: String },

    /// An add conflicts with an existing entry.
    #[error("entry already exists: '{dn}'")]
    EntryAlreadyExists { dn: String },

    /// A DN or RDN is structurally invalid, or an entry violates its
    /// naming rules.
    #[error("naming violation: {detail}")]
    NamingViolation { detail: String },

    // === Schema ===
    /// A value does not conform to the attribute's syntax.
    #[error("invalid attribute syntax for '{attribute}': {detail}")]
    InvalidAttributeSyntax { attribute: String, detail: String },

    // === Authorization ===
    /// The bound identity may not perform the operation.
    #[error("insufficient access rights for '{dn}'")]
    InsufficientAccessRights { dn: String },

    // === Late invariant violations ===
    /// The server refuses the operation (e.g. a referral entry carrying no
    /// usable URL, or a delete of a non-leaf entry).
    #[error("unwilling to perform: {detail}")]
    UnwillingToPerform { detail: String },

    /// A move or rename would cross a partition boundary.
    #[error("operation affects multiple DSAs")]
    AffectsMultipleDsas,

    // === Change-log ===
    /// The change-log cannot restore the requested revision.
    #[error("cannot revert to revision {revision}: {detail}")]
    Unrevertable { revision: u64, detail: String },

    // === LDAP URLs ===
    /// A `ref` value could not be parsed as a valid LDAP URL.
    #[error("invalid LDAP URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    // === Cursor-local ===
    /// `get` was called while no current element exists.
    #[error("invalid cursor position")]
    InvalidCursorPosition,

    /// The underlying source cannot answer this positioning query cheaply.
    #[error("unsupported cursor operation: {operation}")]
    UnsupportedOperation { operation: &'static str },

    /// The cursor was already closed.
    #[error("cursor is closed")]
    CursorClosed,

    // === Catch-all ===
    /// Internal failure that has no protocol mapping.
    #[error("{0}")]
    Other(String),
}

impl DirectoryError {
    /// Internal error with no protocol mapping. Never used to widen an
    /// already-typed protocol error.
    pub fn other(detail: impl Into<String>) -> Self {
        DirectoryError::Other(detail.into())
    }

    pub fn no_such_object(dn: impl ToString) -> Self {
        DirectoryError::NoSuchObject {
            dn: dn.to_string(),
        }
    }

    pub fn already_exists(dn: impl ToString) -> Self {
        DirectoryError::EntryAlreadyExists {
            dn: dn.to_string(),
        }
    }

    pub fn naming_violation(detail: impl Into<String>) -> Self {
        DirectoryError::NamingViolation {
            detail: detail.into(),
        }
    }

    pub fn unwilling(detail: impl Into<String>) -> Self {
        DirectoryError::UnwillingToPerform {
            detail: detail.into(),
        }
    }

    /// True for the variants a search response adapter maps to a terminal
    /// `SearchResultDone` rather than propagating.
    pub fn is_protocol_error(&self) -> bool {
        !matches!(
            self,
            DirectoryError::InvalidCursorPosition
                | DirectoryError::UnsupportedOperation { .. }
                | DirectoryError::CursorClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_payload() {
        let err = DirectoryError::no_such_object("cn=missing,ou=system");
        assert_eq!(err.to_string(), "no such object: 'cn=missing,ou=system'");

        let err = DirectoryError::InvalidAttributeSyntax {
            attribute: "cn".to_string(),
            detail: "empty value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid attribute syntax for 'cn': empty value"
        );
    }

    #[test]
    fn test_cursor_errors_are_not_protocol_errors() {
        assert!(!DirectoryError::InvalidCursorPosition.is_protocol_error());
        assert!(!DirectoryError::CursorClosed.is_protocol_error());
        assert!(DirectoryError::no_such_object("ou=x").is_protocol_error());
    }
}
