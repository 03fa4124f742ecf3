//! oxidir: an embeddable LDAP directory server core.
//!
//! This facade re-exports the public surface of the workspace crates:
//! the data model (`oxidir-types`), the error taxonomy (`oxidir-error`),
//! the storage seam (`oxidir-partition`) and the operation pipeline
//! (`oxidir-core`).
//!
//! ```
//! use oxidir::{CoreSession, DirectoryService, Dn, Entry};
//!
//! let service = DirectoryService::new().unwrap();
//! let session = service.admin_session();
//!
//! let dn = Dn::parse("cn=Kate Bush,ou=system").unwrap();
//! let mut entry = Entry::new(dn.clone());
//! entry.put("objectClass", ["top", "person"]);
//! entry.put("cn", ["Kate Bush"]);
//! entry.put("sn", ["Bush"]);
//! service.add(&session, entry).unwrap();
//!
//! assert!(service.has_entry(&session, &dn).unwrap());
//! ```

pub use oxidir_error::{DirectoryError, Result};

pub use oxidir_types::{
    parse_ldif, Attribute, AttributeType, Ava, Dn, Entry, Filter, LdapUrl, LdifRecord,
    MatchingKind, Modification, ObjectClass, Rdn, Registries, ResultCode, Scheme, SearchResponse,
    SearchResultDone, SearchResultEntry, SearchResultReference, SearchScope, Value,
};

pub use oxidir_partition::{
    AndCursor, AttributeIndex, AvlPartition, Cursor, EntryCursor, EntryId, Evaluator,
    FilterEvaluator, ListCursor, Partition,
};

pub use oxidir_core::{
    is_referral_entry, referral_urls, BypassSet, ChangeLog, ChangeLogEvent, ChangeSummary,
    CoreSession, DirectoryService, EntryFilteringCursor, EntryToResponseCursor, Interceptor,
    InterceptorChain, Next, OpReply, Operation, OperationContext, PartitionNexus, RecordedOp,
    ReferralHit, ReferralManager, SearchReply, ADMIN_DN, SYSTEM_SUFFIX,
};
