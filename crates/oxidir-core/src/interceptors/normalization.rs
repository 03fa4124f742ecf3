//! First stage: normalize every DN entering the pipeline.
//!
//! Past this stage the target DN, entry DNs and attribute ids are in
//! their canonical forms; everything downstream compares normalized
//! bytes only.

use std::sync::Arc;

use oxidir_error::Result;
use oxidir_types::{Entry, Registries};

use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};

pub struct NormalizationInterceptor {
    registries: Arc<Registries>,
}

impl NormalizationInterceptor {
    pub fn new(registries: Arc<Registries>) -> NormalizationInterceptor {
        NormalizationInterceptor { registries }
    }

    /// Rebuild an entry with canonical attribute ids and schema-resolved
    /// matching rules.
    fn normalize_entry(&self, entry: &Entry) -> Entry {
        let dn = entry.dn().normalize(&self.registries);
        let mut out = Entry::new(dn);
        for attr in entry.attributes() {
            for value in attr.values() {
                out.add_value_with(attr.id(), value.clone(), &self.registries);
            }
        }
        out
    }
}

impl Interceptor for NormalizationInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        ctx.dn = ctx.dn.normalize(&self.registries);

        match &mut ctx.operation {
            Operation::Add { entry } => {
                *entry = self.normalize_entry(entry);
                ctx.dn = entry.dn().clone();
            }
            Operation::Move { new_parent } => {
                *new_parent = new_parent.normalize(&self.registries);
            }
            Operation::MoveAndRename { new_parent, .. } => {
                *new_parent = new_parent.normalize(&self.registries);
            }
            _ => {}
        }

        next.invoke(ctx)
    }
}
