//! The referral stage.
//!
//! On the way down: if the target DN sits at or below a known referral
//! and the context does not carry `ManageDsaIT`, the request is answered
//! with a referral reply instead of being forwarded. For an ancestor hit
//! the URLs are rewritten so their DN component names the actual target
//! inside the remote namespace.
//!
//! On the way back: after the partition has committed a mutation, the
//! referral set is brought back in line with the directory content. The
//! set is never touched before the commit.

use std::sync::Arc;

use oxidir_error::{DirectoryError, Result};
use oxidir_types::{Dn, Entry, LdapUrl};

use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};
use crate::nexus::PartitionNexus;
use crate::referral::{is_referral_entry, ReferralHit, ReferralManager};

pub struct ReferralInterceptor {
    manager: Arc<ReferralManager>,
    nexus: Arc<PartitionNexus>,
}

impl ReferralInterceptor {
    pub fn new(manager: Arc<ReferralManager>, nexus: Arc<PartitionNexus>) -> ReferralInterceptor {
        ReferralInterceptor { manager, nexus }
    }

    /// The target entry as currently stored, if it exists.
    fn peek(&self, dn: &Dn) -> Option<Entry> {
        self.nexus.lookup(dn, None).ok()
    }

    /// Rewrite an ancestor referral's URLs for the actual target: the
    /// components of the target above the referral DN are grafted onto
    /// each URL's DN.
    fn rewrite(target: &Dn, ref_dn: &Dn, urls: &[LdapUrl]) -> Result<Vec<LdapUrl>> {
        urls.iter()
            .map(|url| {
                let remote = target.rebase(ref_dn, url.dn())?;
                Ok(url.with_dn(remote))
            })
            .collect()
    }

    fn redirect(&self, ctx: &OperationContext) -> Result<Option<Vec<LdapUrl>>> {
        if ctx.manage_dsa_it || ctx.dn.is_empty() {
            return Ok(None);
        }
        match self.manager.lookup(&ctx.dn) {
            ReferralHit::None => Ok(None),
            ReferralHit::Exact { urls, .. } => {
                if urls.is_empty() {
                    return Err(DirectoryError::unwilling(format!(
                        "referral entry '{}' has no usable URL",
                        ctx.dn
                    )));
                }
                Ok(Some(urls))
            }
            ReferralHit::Ancestor { dn: ref_dn, urls } => {
                if urls.is_empty() {
                    return Err(DirectoryError::unwilling(format!(
                        "referral entry '{ref_dn}' has no usable URL"
                    )));
                }
                Ok(Some(Self::rewrite(&ctx.dn, &ref_dn, &urls)?))
            }
        }
    }
}

impl Interceptor for ReferralInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        if let Some(urls) = self.redirect(ctx)? {
            return Ok(OpReply::Referral(urls));
        }

        // Pre-operation state, needed to tell whether referral-ness
        // changed once the partition has committed.
        let pre = match &ctx.operation {
            Operation::Add { entry } => is_referral_entry(entry).then(|| entry.clone()),
            Operation::Delete
            | Operation::Modify { .. }
            | Operation::Rename { .. }
            | Operation::Move { .. }
            | Operation::MoveAndRename { .. } => self.peek(&ctx.dn),
            _ => None,
        };

        let reply = next.invoke(ctx)?;
        if reply.is_referral() {
            return Ok(reply);
        }

        match &ctx.operation {
            Operation::Add { entry } => {
                if is_referral_entry(entry) {
                    self.manager.add_referral(entry)?;
                }
            }
            Operation::Delete => {
                let deleted = ctx.entry.as_ref().or(pre.as_ref());
                if deleted.is_some_and(is_referral_entry) {
                    self.manager.remove_referral(&ctx.dn);
                }
            }
            Operation::Modify { .. } => {
                let was = pre.as_ref().is_some_and(is_referral_entry);
                let now = ctx.entry.as_ref().is_some_and(is_referral_entry);
                if was || now {
                    self.manager.reconcile(&ctx.dn, ctx.entry.as_ref())?;
                }
            }
            Operation::Rename { .. } | Operation::Move { .. } | Operation::MoveAndRename { .. } => {
                let was = pre.as_ref().is_some_and(is_referral_entry);
                let now = ctx.entry.as_ref().is_some_and(is_referral_entry);
                if was || now {
                    self.manager.reconcile(&ctx.dn, ctx.entry.as_ref())?;
                }
            }
            _ => {}
        }

        Ok(reply)
    }
}
