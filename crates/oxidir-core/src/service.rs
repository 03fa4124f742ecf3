//! The directory service: startup wiring and the operation entry points.
//!
//! A service owns the schema registries, the partition nexus, the frozen
//! interceptor chain, the referral manager and the change-log. It boots
//! with the system partition at `ou=system` holding the admin account,
//! after which callers register their own partitions and drive
//! operations through a session.

use std::sync::Arc;

use tracing::{debug, info, warn};

use oxidir_error::{DirectoryError, Result};
use oxidir_partition::{AvlPartition, Partition};
use oxidir_types::{
    parse_ldif, Dn, Entry, Filter, LdapUrl, Modification, Rdn, Registries, SearchScope, Value,
};

use crate::changelog::ChangeLog;
use crate::chain::InterceptorChain;
use crate::context::{BypassSet, OpReply, Operation, OperationContext};
use crate::interceptors::{
    AuthorizationInterceptor, ChangeLogInterceptor, ExceptionInterceptor,
    NormalizationInterceptor, OperationalInterceptor, ReferralInterceptor, SchemaInterceptor,
    UuidAllocator, AUTHORIZATION, CHANGELOG, EXCEPTION, NORMALIZATION, OPERATIONAL, REFERRAL,
    SCHEMA,
};
use crate::nexus::PartitionNexus;
use crate::referral::ReferralManager;
use crate::response::{EntryFilteringCursor, EntryPredicate, EntryToResponseCursor};
use crate::session::{CoreSession, ADMIN_DN};

pub const SYSTEM_SUFFIX: &str = "ou=system";

/// What a search comes back with: a redirect, or a response stream.
pub enum SearchReply {
    Referral(Vec<LdapUrl>),
    Results(EntryToResponseCursor),
}

pub struct DirectoryService {
    registries: Arc<Registries>,
    nexus: Arc<PartitionNexus>,
    chain: InterceptorChain,
    referral_manager: Arc<ReferralManager>,
    changelog: Arc<ChangeLog>,
    uuids: Arc<UuidAllocator>,
}

impl DirectoryService {
    /// Build the default chain, register the system partition and seed
    /// the admin account.
    pub fn new() -> Result<DirectoryService> {
        let registries = Arc::new(Registries::core_schema());
        let nexus = Arc::new(PartitionNexus::new(registries.clone()));
        let referral_manager = Arc::new(ReferralManager::new());
        let changelog = Arc::new(ChangeLog::new());
        let uuids = Arc::new(UuidAllocator::new());

        let mut chain = InterceptorChain::new(nexus.clone());
        chain.add_last(
            NORMALIZATION,
            Arc::new(NormalizationInterceptor::new(registries.clone())),
        )?;
        chain.add_last(
            REFERRAL,
            Arc::new(ReferralInterceptor::new(
                referral_manager.clone(),
                nexus.clone(),
            )),
        )?;
        chain.add_last(AUTHORIZATION, Arc::new(AuthorizationInterceptor::new(&registries)))?;
        chain.add_last(EXCEPTION, Arc::new(ExceptionInterceptor::new(nexus.clone())))?;
        chain.add_last(SCHEMA, Arc::new(SchemaInterceptor::new(registries.clone())))?;
        chain.add_last(
            OPERATIONAL,
            Arc::new(OperationalInterceptor::new(
                registries.clone(),
                uuids.clone(),
            )),
        )?;
        chain.add_last(CHANGELOG, Arc::new(ChangeLogInterceptor::new(changelog.clone())))?;
        chain.freeze();

        let service = DirectoryService {
            registries,
            nexus,
            chain,
            referral_manager,
            changelog,
            uuids,
        };
        service.bootstrap_system_partition()?;
        info!("directory service started");
        Ok(service)
    }

    fn bootstrap_system_partition(&self) -> Result<()> {
        let system = Arc::new(AvlPartition::new(
            "system",
            Dn::parse(SYSTEM_SUFFIX)?,
            self.registries.clone(),
        ));
        system.add_index("objectClass");
        system.add_index("ou");
        system.add_index("cn");
        self.add_partition(system)?;

        let admin = CoreSession::admin();

        let suffix = Dn::parse(SYSTEM_SUFFIX)?;
        let mut context_entry = Entry::new(suffix.clone());
        context_entry.put("objectClass", ["top", "organizationalUnit"]);
        context_entry.put("ou", ["system"]);
        self.add(&admin, context_entry)?;

        let admin_dn = Dn::parse(ADMIN_DN)?;
        let mut admin_entry = Entry::new(admin_dn);
        admin_entry.put("objectClass", ["top", "person"]);
        admin_entry.put("uid", ["admin"]);
        admin_entry.put("cn", ["system administrator"]);
        admin_entry.put("sn", ["administrator"]);
        self.add(&admin, admin_entry)?;
        Ok(())
    }

    /// Register a partition and seed the referral set from its content.
    pub fn add_partition(&self, partition: Arc<dyn Partition>) -> Result<()> {
        self.nexus.register(partition.clone())?;
        self.referral_manager.init_partition(partition.as_ref())?;
        Ok(())
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn nexus(&self) -> &Arc<PartitionNexus> {
        &self.nexus
    }

    pub fn referral_manager(&self) -> &Arc<ReferralManager> {
        &self.referral_manager
    }

    pub fn changelog(&self) -> &ChangeLog {
        &self.changelog
    }

    pub fn uuid_allocator(&self) -> &Arc<UuidAllocator> {
        &self.uuids
    }

    pub fn admin_session(&self) -> CoreSession {
        CoreSession::admin()
    }

    /// Stage names in invocation order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.names()
    }

    /// Run a prepared context down the chain.
    pub fn execute(&self, ctx: &mut OperationContext) -> Result<OpReply> {
        debug!(op = ctx.operation.kind(), dn = %ctx.dn, "dispatching operation");
        self.chain.invoke(ctx)
    }

    // === Operation entry points ===

    /// Bind a session for `dn`. Credential verification belongs to the
    /// wire adapter; the core checks the identity names a real entry.
    /// The empty DN binds anonymously.
    pub fn bind(&self, dn: &Dn) -> Result<CoreSession> {
        let mut ctx =
            OperationContext::new(CoreSession::anonymous(), dn.clone(), Operation::Bind);
        self.execute(&mut ctx)?;
        Ok(CoreSession::new(ctx.dn))
    }

    pub fn add(&self, session: &CoreSession, entry: Entry) -> Result<OpReply> {
        self.add_with(session, entry, false)
    }

    pub fn add_with(
        &self,
        session: &CoreSession,
        entry: Entry,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let dn = entry.dn().clone();
        let mut ctx = OperationContext::new(session.clone(), dn, Operation::Add { entry })
            .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    pub fn delete(
        &self,
        session: &CoreSession,
        dn: &Dn,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let mut ctx = OperationContext::new(session.clone(), dn.clone(), Operation::Delete)
            .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    pub fn modify(
        &self,
        session: &CoreSession,
        dn: &Dn,
        mods: Vec<Modification>,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let mut ctx =
            OperationContext::new(session.clone(), dn.clone(), Operation::Modify { mods })
                .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    pub fn lookup(
        &self,
        session: &CoreSession,
        dn: &Dn,
        attrs: Option<&[String]>,
    ) -> Result<OpReply> {
        let mut ctx = OperationContext::new(
            session.clone(),
            dn.clone(),
            Operation::Lookup {
                attrs: attrs.map(<[String]>::to_vec),
            },
        );
        self.execute(&mut ctx)
    }

    pub fn has_entry(&self, session: &CoreSession, dn: &Dn) -> Result<bool> {
        let mut ctx = OperationContext::new(session.clone(), dn.clone(), Operation::HasEntry);
        match self.execute(&mut ctx)? {
            OpReply::Bool(b) => Ok(b),
            reply => Err(DirectoryError::other(format!(
                "hasEntry produced unexpected reply {reply:?}"
            ))),
        }
    }

    pub fn compare(
        &self,
        session: &CoreSession,
        dn: &Dn,
        attr: &str,
        value: &str,
    ) -> Result<OpReply> {
        let mut ctx = OperationContext::new(
            session.clone(),
            dn.clone(),
            Operation::Compare {
                attr: attr.to_string(),
                value: Value::text(value),
            },
        );
        self.execute(&mut ctx)
    }

    pub fn rename(
        &self,
        session: &CoreSession,
        dn: &Dn,
        new_rdn: &str,
        delete_old_rdn: bool,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let new_rdn = Rdn::parse(new_rdn)?;
        let mut ctx = OperationContext::new(
            session.clone(),
            dn.clone(),
            Operation::Rename {
                new_rdn,
                delete_old_rdn,
            },
        )
        .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    pub fn move_entry(
        &self,
        session: &CoreSession,
        dn: &Dn,
        new_parent: &Dn,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let mut ctx = OperationContext::new(
            session.clone(),
            dn.clone(),
            Operation::Move {
                new_parent: new_parent.clone(),
            },
        )
        .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    pub fn move_and_rename(
        &self,
        session: &CoreSession,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: &str,
        delete_old_rdn: bool,
        manage_dsa_it: bool,
    ) -> Result<OpReply> {
        let new_rdn = Rdn::parse(new_rdn)?;
        let mut ctx = OperationContext::new(
            session.clone(),
            dn.clone(),
            Operation::MoveAndRename {
                new_parent: new_parent.clone(),
                new_rdn,
                delete_old_rdn,
            },
        )
        .with_manage_dsa_it(manage_dsa_it);
        self.execute(&mut ctx)
    }

    /// Search, returning either a referral redirect or the response
    /// stream (entries, continuation references, then one done message).
    #[allow(clippy::too_many_arguments)]
    pub fn search(
        &self,
        session: &CoreSession,
        base: &Dn,
        scope: SearchScope,
        filter: Filter,
        attrs: Option<Vec<String>>,
        manage_dsa_it: bool,
        message_id: i32,
    ) -> Result<SearchReply> {
        let mut ctx = OperationContext::new(
            session.clone(),
            base.clone(),
            Operation::Search {
                scope,
                filter,
                attrs: attrs.clone(),
            },
        )
        .with_manage_dsa_it(manage_dsa_it)
        .with_message_id(message_id);

        match self.execute(&mut ctx)? {
            OpReply::Referral(urls) => Ok(SearchReply::Referral(urls)),
            OpReply::Entries(cursor) => {
                let filtered = EntryFilteringCursor::new(
                    cursor,
                    self.visibility_predicate(session),
                    attrs,
                );
                Ok(SearchReply::Results(EntryToResponseCursor::new(
                    message_id,
                    Box::new(filtered),
                    manage_dsa_it,
                )))
            }
            reply => Err(DirectoryError::other(format!(
                "search produced unexpected reply {reply:?}"
            ))),
        }
    }

    fn visibility_predicate(&self, session: &CoreSession) -> EntryPredicate {
        let admin_dn = Dn::parse(ADMIN_DN)
            .expect("admin DN parses")
            .normalize(&self.registries);
        let is_admin = session.is_admin();
        Box::new(move |entry| is_admin || *entry.dn() != admin_dn)
    }

    /// Apply LDIF add records through the pipeline. Records whose DN
    /// already exists are skipped, so re-application is idempotent. Only
    /// the authorization stage is bypassed: referral bookkeeping,
    /// operational stamping and change-log recording all still apply.
    pub fn apply_ldif(&self, session: &CoreSession, text: &str) -> Result<usize> {
        let mut applied = 0;
        for record in parse_ldif(text)? {
            let dn = Dn::parse(&record.dn)?.normalize(&self.registries);
            if self.nexus.has_entry(&dn)? {
                debug!(%dn, "ldif record already present, skipping");
                continue;
            }
            let entry = Entry::from_attrs(
                dn.clone(),
                record
                    .attributes
                    .iter()
                    .map(|(id, value)| (id.as_str(), value.as_str())),
                &self.registries,
            );
            let mut ctx = OperationContext::new(session.clone(), dn.clone(), Operation::Add {
                entry,
            })
            .with_bypass(BypassSet::of(&[AUTHORIZATION]));
            match self.execute(&mut ctx)? {
                OpReply::Referral(_) => {
                    warn!(%dn, "ldif record sits under a referral, skipping");
                }
                _ => applied += 1,
            }
        }
        Ok(applied)
    }

    /// Restore the directory to the state tagged by `to_revision`:
    /// replay the recorded reverse operations newest-first. The replay
    /// re-enters the pipeline with everything but the referral stage
    /// bypassed: nothing is re-recorded or re-validated, while the
    /// referral set keeps tracking the entries being restored.
    pub fn revert(&self, to_revision: u64) -> Result<u64> {
        let current = self.changelog.current_revision();
        if to_revision > current {
            return Err(DirectoryError::Unrevertable {
                revision: to_revision,
                detail: format!("current revision is {current}"),
            });
        }

        let events = self.changelog.events_after(to_revision);
        let admin = self.admin_session();
        for event in events.iter().rev() {
            let Some(reverse) = event.reverse.clone() else {
                return Err(DirectoryError::Unrevertable {
                    revision: to_revision,
                    detail: format!("revision {} recorded no reverse operation", event.revision),
                });
            };
            debug!(
                revision = event.revision,
                op = reverse.operation.kind(),
                dn = %reverse.dn,
                "replaying reverse operation"
            );
            let mut ctx =
                OperationContext::new(admin.clone(), reverse.dn, reverse.operation)
                    .with_bypass(BypassSet::of(&[
                        NORMALIZATION,
                        AUTHORIZATION,
                        EXCEPTION,
                        SCHEMA,
                        OPERATIONAL,
                        CHANGELOG,
                    ]))
                    .with_manage_dsa_it(true);
            self.execute(&mut ctx)?;
        }

        self.changelog.truncate_after(to_revision);
        info!(revision = to_revision, reverted = events.len(), "reverted change-log");
        Ok(to_revision)
    }
}
