//! Typed existence failures, raised ahead of the partition.
//!
//! Adds fail early on a missing parent or an existing target; mutations
//! of a missing target fail with `no-such-object` here rather than deep
//! in the store. As a side effect the pre-operation entry is loaded into
//! the context for the stages behind this one (change-log reversal needs
//! it).

use std::sync::Arc;

use oxidir_error::{DirectoryError, Result};

use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};
use crate::nexus::PartitionNexus;

pub struct ExceptionInterceptor {
    nexus: Arc<PartitionNexus>,
}

impl ExceptionInterceptor {
    pub fn new(nexus: Arc<PartitionNexus>) -> ExceptionInterceptor {
        ExceptionInterceptor { nexus }
    }
}

impl Interceptor for ExceptionInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        match &ctx.operation {
            Operation::Add { .. } => {
                if self.nexus.has_entry(&ctx.dn)? {
                    return Err(DirectoryError::already_exists(&ctx.dn));
                }
                // Partition suffix entries have no parent to check.
                if !self.nexus.is_suffix(&ctx.dn) {
                    if let Some(parent) = ctx.dn.parent() {
                        if !parent.is_empty() && !self.nexus.has_entry(&parent)? {
                            return Err(DirectoryError::no_such_object(&parent));
                        }
                    }
                }
            }
            Operation::Delete
            | Operation::Modify { .. }
            | Operation::Rename { .. }
            | Operation::Move { .. }
            | Operation::MoveAndRename { .. } => {
                if ctx.dn.is_empty() {
                    return Err(DirectoryError::unwilling(
                        "the root DSE cannot be modified",
                    ));
                }
                let entry = self.nexus.lookup(&ctx.dn, None)?;
                ctx.entry = Some(entry);

                if let Operation::Move { new_parent }
                | Operation::MoveAndRename { new_parent, .. } = &ctx.operation
                {
                    if !self.nexus.has_entry(new_parent)? {
                        return Err(DirectoryError::no_such_object(new_parent));
                    }
                }
            }
            _ => {}
        }
        next.invoke(ctx)
    }
}
