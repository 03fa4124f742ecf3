//! Change-log recording.
//!
//! Sits last before the nexus. Once a mutation has committed, the event
//! goes in: the forward summary and a reverse operation computed from
//! the pre-operation entry the earlier stages loaded into the context.
//! Disabled logs and non-mutating operations pass straight through.

use std::sync::Arc;

use oxidir_error::Result;
use tracing::debug;

use oxidir_types::{Dn, Entry};

use crate::changelog::{ChangeLog, ChangeSummary, RecordedOp};
use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};

pub struct ChangeLogInterceptor {
    log: Arc<ChangeLog>,
}

impl ChangeLogInterceptor {
    pub fn new(log: Arc<ChangeLog>) -> ChangeLogInterceptor {
        ChangeLogInterceptor { log }
    }
}

impl Interceptor for ChangeLogInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        if !self.log.is_enabled() || !ctx.operation.is_mutation() {
            return next.invoke(ctx);
        }

        let forward_op = ctx.operation.clone();
        let dn = ctx.dn.clone();
        let pre = ctx.entry.clone();

        let reply = next.invoke(ctx)?;
        if reply.is_referral() {
            return Ok(reply);
        }

        let reverse = reverse_of(
            &forward_op,
            &dn,
            pre.as_ref(),
            ctx.entry.as_ref(),
            ctx.new_dn.as_ref(),
        );
        if reverse.is_none() {
            debug!(op = forward_op.kind(), %dn, "no reverse available for change");
        }
        self.log.append(
            ChangeSummary {
                kind: forward_op.kind().to_string(),
                dn: dn.to_string(),
            },
            reverse,
        );

        Ok(reply)
    }
}

/// The operation that undoes `op`, given the pre/post entries and the
/// post-operation DN where applicable.
fn reverse_of(
    op: &Operation,
    dn: &Dn,
    pre: Option<&Entry>,
    post: Option<&Entry>,
    new_dn: Option<&Dn>,
) -> Option<RecordedOp> {
    match op {
        Operation::Add { .. } => Some(RecordedOp {
            dn: dn.clone(),
            operation: Operation::Delete,
        }),
        Operation::Delete => {
            // The nexus leaves the deleted entry in the context; fall back
            // to the pre-fetched copy when the tail was bypassed.
            let entry = post.or(pre)?.clone();
            Some(RecordedOp {
                dn: dn.clone(),
                operation: Operation::Add { entry },
            })
        }
        Operation::Modify { mods } => {
            let prior = pre?;
            // Inverses apply in reverse order of the originals.
            let inverse: Vec<_> = mods
                .iter()
                .rev()
                .filter_map(|m| m.inverse(prior))
                .collect();
            Some(RecordedOp {
                dn: dn.clone(),
                operation: Operation::Modify { mods: inverse },
            })
        }
        Operation::Rename { delete_old_rdn, .. } => {
            let new_dn = new_dn?.clone();
            let old_rdn = dn.rdn()?.clone();
            Some(RecordedOp {
                dn: new_dn,
                operation: Operation::Rename {
                    new_rdn: old_rdn,
                    delete_old_rdn: *delete_old_rdn,
                },
            })
        }
        Operation::Move { .. } => {
            let new_dn = new_dn?.clone();
            let old_parent = dn.parent()?;
            Some(RecordedOp {
                dn: new_dn,
                operation: Operation::Move {
                    new_parent: old_parent,
                },
            })
        }
        Operation::MoveAndRename { delete_old_rdn, .. } => {
            let new_dn = new_dn?.clone();
            let old_parent = dn.parent()?;
            let old_rdn = dn.rdn()?.clone();
            Some(RecordedOp {
                dn: new_dn,
                operation: Operation::MoveAndRename {
                    new_parent: old_parent,
                    new_rdn: old_rdn,
                    delete_old_rdn: *delete_old_rdn,
                },
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use oxidir_types::{Modification, Value};

    use super::*;

    fn entry(dn: &str, pairs: &[(&str, &str)]) -> Entry {
        let mut e = Entry::new(Dn::parse(dn).unwrap());
        for (id, value) in pairs {
            e.add_value(id, Value::text(*value));
        }
        e
    }

    #[test]
    fn test_reverse_of_add_is_delete() {
        let dn = Dn::parse("cn=a,ou=system").unwrap();
        let op = Operation::Add {
            entry: entry("cn=a,ou=system", &[("objectClass", "person")]),
        };
        let reverse = reverse_of(&op, &dn, None, None, None).unwrap();
        assert!(matches!(reverse.operation, Operation::Delete));
        assert_eq!(reverse.dn, dn);
    }

    #[test]
    fn test_reverse_of_delete_restores_original() {
        let dn = Dn::parse("cn=a,ou=system").unwrap();
        let deleted = entry(
            "cn=a,ou=system",
            &[("objectClass", "person"), ("cn", "a"), ("sn", "b")],
        );
        let reverse = reverse_of(&Operation::Delete, &dn, None, Some(&deleted), None).unwrap();
        let Operation::Add { entry: restored } = reverse.operation else {
            panic!("expected add");
        };
        assert_eq!(restored.first("sn"), Some("b"));
    }

    #[test]
    fn test_reverse_of_delete_without_state_is_none() {
        let dn = Dn::parse("cn=a,ou=system").unwrap();
        assert!(reverse_of(&Operation::Delete, &dn, None, None, None).is_none());
    }

    #[test]
    fn test_reverse_of_modify_inverts_in_reverse_order() {
        let dn = Dn::parse("cn=a,ou=system").unwrap();
        let prior = entry("cn=a,ou=system", &[("cn", "a"), ("description", "old")]);
        let op = Operation::Modify {
            mods: vec![
                Modification::Replace {
                    attribute: "description".to_string(),
                    values: vec![Value::text("new")],
                },
                Modification::Add {
                    attribute: "sn".to_string(),
                    values: vec![Value::text("x")],
                },
            ],
        };
        let reverse = reverse_of(&op, &dn, Some(&prior), None, None).unwrap();
        let Operation::Modify { mods } = reverse.operation else {
            panic!("expected modify");
        };
        // The add's inverse (remove) comes first, then the replace's.
        assert!(matches!(mods[0], Modification::Remove { .. }));
        assert!(matches!(mods[1], Modification::Replace { .. }));
    }

    #[test]
    fn test_reverse_of_rename_swaps_rdns() {
        let dn = Dn::parse("cn=old,ou=system").unwrap();
        let new_dn = Dn::parse("cn=new,ou=system").unwrap();
        let op = Operation::Rename {
            new_rdn: oxidir_types::Rdn::parse("cn=new").unwrap(),
            delete_old_rdn: true,
        };
        let reverse = reverse_of(&op, &dn, None, None, Some(&new_dn)).unwrap();
        assert_eq!(reverse.dn, new_dn);
        let Operation::Rename { new_rdn, .. } = reverse.operation else {
            panic!("expected rename");
        };
        assert_eq!(new_rdn.norm(), "cn=old");
    }
}
