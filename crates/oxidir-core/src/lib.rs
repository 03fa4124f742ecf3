//! The oxidir directory server core.
//!
//! Every directory request travels as an operation context through an
//! ordered interceptor chain (normalization, referral handling,
//! authorization, existence checks, schema validation, operational
//! attributes, change-log recording) and terminates at the partition
//! nexus, which routes it to the partition owning the target DN. Search
//! results stream back out through filtering and response-adapter
//! cursors.
//!
//! Referral handling follows RFC 3296: operations at or below a known
//! referral come back as an explicit referral reply (never an error)
//! unless the context carries `ManageDsaIT`, and the referral set is
//! maintained as a side effect of committed mutations.

pub mod chain;
pub mod changelog;
pub mod context;
pub mod interceptors;
pub mod nexus;
pub mod referral;
pub mod response;
pub mod service;
pub mod session;

pub use chain::{Interceptor, InterceptorChain, Next};
pub use changelog::{ChangeLog, ChangeLogEvent, ChangeSummary, RecordedOp};
pub use context::{BypassSet, OpReply, Operation, OperationContext};
pub use nexus::PartitionNexus;
pub use referral::{is_referral_entry, referral_urls, ReferralHit, ReferralManager};
pub use response::{EntryFilteringCursor, EntryToResponseCursor};
pub use service::{DirectoryService, SearchReply, SYSTEM_SUFFIX};
pub use session::{CoreSession, ADMIN_DN};
