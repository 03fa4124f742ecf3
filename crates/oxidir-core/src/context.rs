//! Operation contexts.
//!
//! One context travels down the interceptor chain per request: the
//! session, the normalized target DN, the tagged operation payload, the
//! control flags, and the per-call bypass set. New operation kinds extend
//! the [`Operation`] enum and the nexus dispatch, not N interfaces.

use std::collections::HashSet;
use std::fmt;

use oxidir_partition::EntryCursor;
use oxidir_types::{Dn, Entry, Filter, LdapUrl, Modification, Rdn, SearchScope, Value};

use crate::session::CoreSession;

/// Which stages to skip for one call.
///
/// Internal code paths (bootstrap, change-log replay) use [`BypassSet::All`]
/// to reach the nexus without recursive interception.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BypassSet {
    #[default]
    None,
    All,
    Named(HashSet<String>),
}

impl BypassSet {
    pub fn of(names: &[&str]) -> BypassSet {
        BypassSet::Named(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            BypassSet::None => false,
            BypassSet::All => true,
            BypassSet::Named(names) => names.contains(name),
        }
    }
}

/// The request payload, tagged by operation kind.
#[derive(Clone, Debug)]
pub enum Operation {
    Add {
        entry: Entry,
    },
    Delete,
    Modify {
        mods: Vec<Modification>,
    },
    Lookup {
        attrs: Option<Vec<String>>,
    },
    Search {
        scope: SearchScope,
        filter: Filter,
        attrs: Option<Vec<String>>,
    },
    Rename {
        new_rdn: Rdn,
        delete_old_rdn: bool,
    },
    Move {
        new_parent: Dn,
    },
    MoveAndRename {
        new_parent: Dn,
        new_rdn: Rdn,
        delete_old_rdn: bool,
    },
    Compare {
        attr: String,
        value: Value,
    },
    Bind,
    HasEntry,
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Delete => "delete",
            Operation::Modify { .. } => "modify",
            Operation::Lookup { .. } => "lookup",
            Operation::Search { .. } => "search",
            Operation::Rename { .. } => "rename",
            Operation::Move { .. } => "move",
            Operation::MoveAndRename { .. } => "moveAndRename",
            Operation::Compare { .. } => "compare",
            Operation::Bind => "bind",
            Operation::HasEntry => "hasEntry",
        }
    }

    /// True for operations that change directory state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Add { .. }
                | Operation::Delete
                | Operation::Modify { .. }
                | Operation::Rename { .. }
                | Operation::Move { .. }
                | Operation::MoveAndRename { .. }
        )
    }
}

/// Everything a stage needs to see about one request.
pub struct OperationContext {
    pub session: CoreSession,
    /// Target DN; normalized past the normalization stage.
    pub dn: Dn,
    pub operation: Operation,
    /// Treat referral entries as ordinary data.
    pub manage_dsa_it: bool,
    pub bypass: BypassSet,
    /// Threaded through to search responses by wire adapters.
    pub message_id: i32,
    /// The target entry as last seen by the pipeline: the pre-operation
    /// state before the nexus commits, the post-operation state after.
    pub entry: Option<Entry>,
    /// The DN an entry ended up at after rename/move, set by the nexus.
    pub new_dn: Option<Dn>,
}

impl OperationContext {
    pub fn new(session: CoreSession, dn: Dn, operation: Operation) -> OperationContext {
        OperationContext {
            session,
            dn,
            operation,
            manage_dsa_it: false,
            bypass: BypassSet::None,
            message_id: 0,
            entry: None,
            new_dn: None,
        }
    }

    #[must_use]
    pub fn with_manage_dsa_it(mut self, manage: bool) -> OperationContext {
        self.manage_dsa_it = manage;
        self
    }

    #[must_use]
    pub fn with_bypass(mut self, bypass: BypassSet) -> OperationContext {
        self.bypass = bypass;
        self
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: i32) -> OperationContext {
        self.message_id = message_id;
        self
    }
}

/// What an operation came back with.
///
/// `Referral` is a reply, not an error: a protocol-defined redirection
/// carrying the URL list derived from the referral entry.
pub enum OpReply {
    Done,
    Entry(Entry),
    Entries(EntryCursor),
    Bool(bool),
    Referral(Vec<LdapUrl>),
}

impl OpReply {
    pub fn is_referral(&self) -> bool {
        matches!(self, OpReply::Referral(_))
    }
}

impl fmt::Debug for OpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpReply::Done => f.write_str("Done"),
            OpReply::Entry(e) => f.debug_tuple("Entry").field(&e.dn().user()).finish(),
            OpReply::Entries(_) => f.write_str("Entries(..)"),
            OpReply::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            OpReply::Referral(urls) => {
                let rendered: Vec<String> = urls.iter().map(LdapUrl::to_string).collect();
                f.debug_tuple("Referral").field(&rendered).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_set_membership() {
        assert!(!BypassSet::None.contains("referral"));
        assert!(BypassSet::All.contains("referral"));
        let named = BypassSet::of(&["0", "4"]);
        assert!(named.contains("0"));
        assert!(named.contains("4"));
        assert!(!named.contains("2"));
    }

    #[test]
    fn test_mutation_classification() {
        assert!(Operation::Delete.is_mutation());
        assert!(!Operation::Bind.is_mutation());
        assert!(!Operation::Lookup { attrs: None }.is_mutation());
        assert!(Operation::Move {
            new_parent: Dn::empty()
        }
        .is_mutation());
    }
}
