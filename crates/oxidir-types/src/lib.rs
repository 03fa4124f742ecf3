//! Core data model for the oxidir directory server.
//!
//! Distinguished names, entries, filters, LDAP URLs, schema registries,
//! LDIF records and search responses. Everything here is storage- and
//! pipeline-agnostic; the operation pipeline lives in `oxidir-core` and
//! the storage model in `oxidir-partition`.

pub mod dn;
pub mod entry;
pub mod filter;
pub mod ldif;
pub mod message;
pub mod schema;
pub mod url;
pub mod value;

pub use dn::{Ava, Dn, Rdn};
pub use entry::{Attribute, Entry, Modification};
pub use filter::{Filter, SearchScope};
pub use ldif::{parse_ldif, LdifRecord};
pub use message::{
    ResultCode, SearchResponse, SearchResultDone, SearchResultEntry, SearchResultReference,
};
pub use schema::{AttributeType, MatchingKind, ObjectClass, Registries};
pub use url::{LdapUrl, Scheme};
pub use value::Value;
