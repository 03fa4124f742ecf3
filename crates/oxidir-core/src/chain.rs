//! The interceptor chain.
//!
//! An ordered list of named stages. Each stage receives the operation
//! context and a [`Next`] handle; it may inspect or rewrite the context,
//! forward through the handle, post-process the reply on the way back, or
//! answer directly without forwarding. The chain ends at the partition
//! nexus. Stage names bypassed by the context's bypass set are skipped
//! without being invoked.
//!
//! Configuration happens at startup: stages are appended, prepended, or
//! inserted relative to an existing name, then the chain is frozen.

use std::sync::Arc;

use oxidir_error::{DirectoryError, Result};
use tracing::trace;

use crate::context::{OpReply, OperationContext};
use crate::nexus::PartitionNexus;

pub trait Interceptor: Send + Sync {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply>;
}

pub struct InterceptorChain {
    stages: Vec<(String, Arc<dyn Interceptor>)>,
    nexus: Arc<PartitionNexus>,
    frozen: bool,
}

impl InterceptorChain {
    pub fn new(nexus: Arc<PartitionNexus>) -> InterceptorChain {
        InterceptorChain {
            stages: Vec::new(),
            nexus,
            frozen: false,
        }
    }

    pub fn nexus(&self) -> &Arc<PartitionNexus> {
        &self.nexus
    }

    /// Stage names in invocation order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn add_last(&mut self, name: &str, stage: Arc<dyn Interceptor>) -> Result<()> {
        self.check_insertable(name)?;
        self.stages.push((name.to_string(), stage));
        Ok(())
    }

    pub fn add_first(&mut self, name: &str, stage: Arc<dyn Interceptor>) -> Result<()> {
        self.check_insertable(name)?;
        self.stages.insert(0, (name.to_string(), stage));
        Ok(())
    }

    pub fn add_before(
        &mut self,
        anchor: &str,
        name: &str,
        stage: Arc<dyn Interceptor>,
    ) -> Result<()> {
        self.check_insertable(name)?;
        let idx = self.position_of(anchor)?;
        self.stages.insert(idx, (name.to_string(), stage));
        Ok(())
    }

    pub fn add_after(
        &mut self,
        anchor: &str,
        name: &str,
        stage: Arc<dyn Interceptor>,
    ) -> Result<()> {
        self.check_insertable(name)?;
        let idx = self.position_of(anchor)?;
        self.stages.insert(idx + 1, (name.to_string(), stage));
        Ok(())
    }

    /// No further stage registration after this.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Run the context down the chain from the first stage.
    pub fn invoke(&self, ctx: &mut OperationContext) -> Result<OpReply> {
        Next {
            chain: self,
            position: 0,
        }
        .invoke(ctx)
    }

    fn check_insertable(&self, name: &str) -> Result<()> {
        if self.frozen {
            return Err(DirectoryError::other("interceptor chain is frozen"));
        }
        if self.stages.iter().any(|(n, _)| n == name) {
            return Err(DirectoryError::other(format!(
                "duplicate interceptor name '{name}'"
            )));
        }
        Ok(())
    }

    fn position_of(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| DirectoryError::other(format!("no interceptor named '{name}'")))
    }
}

/// A stage's handle on the remainder of the chain.
pub struct Next<'a> {
    chain: &'a InterceptorChain,
    position: usize,
}

impl Next<'_> {
    /// Forward to the rest of the chain. Bypassed stages are skipped
    /// without being invoked; past the last stage the nexus executes.
    pub fn invoke(self, ctx: &mut OperationContext) -> Result<OpReply> {
        let mut position = self.position;
        while let Some((name, stage)) = self.chain.stages.get(position) {
            if ctx.bypass.contains(name) {
                trace!(stage = %name, op = ctx.operation.kind(), "stage bypassed");
                position += 1;
                continue;
            }
            let next = Next {
                chain: self.chain,
                position: position + 1,
            };
            return stage.invoke(ctx, next);
        }
        self.chain.nexus.execute(ctx)
    }
}
