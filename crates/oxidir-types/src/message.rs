//! Search response messages.
//!
//! The wire codec proper is an external adapter; these are the typed
//! messages the response-adapter cursor produces from raw entries.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// LDAP result codes, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success = 0,
    OperationsError = 1,
    Referral = 10,
    NoSuchAttribute = 16,
    InvalidAttributeSyntax = 21,
    NoSuchObject = 32,
    InsufficientAccessRights = 50,
    UnwillingToPerform = 53,
    AffectsMultipleDsas = 71,
    NamingViolation = 64,
    EntryAlreadyExists = 68,
    Other = 80,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResultEntry {
    pub message_id: i32,
    pub entry: Entry,
}

/// A continuation reference emitted when a subtree search crosses a
/// descendant referral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResultReference {
    pub message_id: i32,
    pub urls: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResultDone {
    pub message_id: i32,
    pub result_code: ResultCode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchResponse {
    Entry(SearchResultEntry),
    Reference(SearchResultReference),
    Done(SearchResultDone),
}

impl SearchResponse {
    pub fn message_id(&self) -> i32 {
        match self {
            SearchResponse::Entry(e) => e.message_id,
            SearchResponse::Reference(r) => r.message_id,
            SearchResponse::Done(d) => d.message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes_match_wire_values() {
        assert_eq!(ResultCode::Success as i32, 0);
        assert_eq!(ResultCode::Referral as i32, 10);
        assert_eq!(ResultCode::NoSuchObject as i32, 32);
        assert_eq!(ResultCode::EntryAlreadyExists as i32, 68);
    }
}
