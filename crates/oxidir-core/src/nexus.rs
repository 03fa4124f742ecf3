//! The partition nexus: the chain's terminal stage.
//!
//! Routes each request to the partition whose suffix is the longest
//! prefix of the target DN, and synthesizes the root DSE for the empty
//! DN from the registered naming contexts. Cross-partition moves fail
//! with `affectsMultipleDSAs`; the nexus never serializes across
//! partitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use oxidir_error::{DirectoryError, Result};
use oxidir_partition::{Evaluator as _, FilterEvaluator, ListCursor, Partition};
use oxidir_types::{Dn, Entry, Registries, SearchScope};

use crate::context::{OpReply, Operation, OperationContext};

pub const VENDOR_NAME: &str = "Oxidir Project";

pub struct PartitionNexus {
    registries: Arc<Registries>,
    partitions: RwLock<BTreeMap<String, Arc<dyn Partition>>>,
}

impl PartitionNexus {
    pub fn new(registries: Arc<Registries>) -> PartitionNexus {
        PartitionNexus {
            registries,
            partitions: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register(&self, partition: Arc<dyn Partition>) -> Result<()> {
        let suffix = partition.suffix().norm().to_string();
        let mut partitions = self.partitions.write();
        if partitions.contains_key(&suffix) {
            return Err(DirectoryError::other(format!(
                "a partition is already registered at '{suffix}'"
            )));
        }
        debug!(id = partition.id(), %suffix, "registering partition");
        partitions.insert(suffix, partition);
        Ok(())
    }

    /// The partition owning `dn`: the registered suffix that is the
    /// longest prefix of it.
    pub fn partition_for(&self, dn: &Dn) -> Result<Arc<dyn Partition>> {
        let partitions = self.partitions.read();
        partitions
            .values()
            .filter(|p| dn.is_within(p.suffix()))
            .max_by_key(|p| p.suffix().size())
            .cloned()
            .ok_or_else(|| DirectoryError::no_such_object(dn))
    }

    pub fn suffixes(&self) -> Vec<Dn> {
        self.partitions
            .read()
            .values()
            .map(|p| p.suffix().clone())
            .collect()
    }

    /// True when `dn` is the suffix of a registered partition.
    pub fn is_suffix(&self, dn: &Dn) -> bool {
        self.partitions.read().contains_key(dn.norm())
    }

    pub fn has_entry(&self, dn: &Dn) -> Result<bool> {
        if dn.is_empty() {
            return Ok(true);
        }
        match self.partition_for(dn) {
            Ok(partition) => partition.has_entry(dn),
            Err(DirectoryError::NoSuchObject { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Direct lookup, outside the chain. The root DSE answers the empty DN.
    pub fn lookup(&self, dn: &Dn, attrs: Option<&[String]>) -> Result<Entry> {
        if dn.is_empty() {
            return Ok(self.root_dse().project(attrs));
        }
        self.partition_for(dn)?.lookup(dn, attrs)
    }

    /// The root DSE, aggregated from the registered partitions.
    pub fn root_dse(&self) -> Entry {
        let mut entry = Entry::new(Dn::empty());
        entry.put("objectClass", ["top", "extensibleObject"]);
        entry.put(
            "namingContexts",
            self.suffixes().iter().map(|s| s.user().to_string()),
        );
        entry.put("subschemaSubentry", ["cn=schema"]);
        entry.put("vendorName", [VENDOR_NAME]);
        entry.put("supportedLDAPVersion", ["3"]);
        entry
    }

    /// Execute the context's operation against the owning partition.
    pub fn execute(&self, ctx: &mut OperationContext) -> Result<OpReply> {
        match ctx.operation.clone() {
            Operation::Add { entry } => {
                self.partition_for(&ctx.dn)?.add(entry)?;
                Ok(OpReply::Done)
            }
            Operation::Delete => {
                let deleted = self.partition_for(&ctx.dn)?.delete(&ctx.dn)?;
                ctx.entry = Some(deleted);
                Ok(OpReply::Done)
            }
            Operation::Modify { mods } => {
                let updated = self.partition_for(&ctx.dn)?.modify(&ctx.dn, &mods)?;
                ctx.entry = Some(updated);
                Ok(OpReply::Done)
            }
            Operation::Lookup { attrs } => {
                Ok(OpReply::Entry(self.lookup(&ctx.dn, attrs.as_deref())?))
            }
            Operation::Search { scope, filter, .. } => {
                if ctx.dn.is_empty() {
                    // Only a base-object search makes sense at the root DSE.
                    let root = self.root_dse();
                    let evaluator =
                        FilterEvaluator::new(filter.clone(), self.registries.clone());
                    let hits = if scope == SearchScope::Base && evaluator.evaluate(&root)? {
                        vec![root]
                    } else {
                        Vec::new()
                    };
                    return Ok(OpReply::Entries(Box::new(ListCursor::new(hits))));
                }
                let cursor = self.partition_for(&ctx.dn)?.search(&ctx.dn, scope, &filter)?;
                Ok(OpReply::Entries(cursor))
            }
            Operation::Rename {
                new_rdn,
                delete_old_rdn,
            } => {
                let (entry, new_dn) =
                    self.partition_for(&ctx.dn)?
                        .rename(&ctx.dn, &new_rdn, delete_old_rdn)?;
                ctx.entry = Some(entry);
                ctx.new_dn = Some(new_dn);
                Ok(OpReply::Done)
            }
            Operation::Move { new_parent } => {
                let source = self.partition_for(&ctx.dn)?;
                let target = self.partition_for(&new_parent)?;
                if !Arc::ptr_eq(&source, &target) {
                    return Err(DirectoryError::AffectsMultipleDsas);
                }
                let (entry, new_dn) = source.move_entry(&ctx.dn, &new_parent)?;
                ctx.entry = Some(entry);
                ctx.new_dn = Some(new_dn);
                Ok(OpReply::Done)
            }
            Operation::MoveAndRename {
                new_parent,
                new_rdn,
                delete_old_rdn,
            } => {
                let source = self.partition_for(&ctx.dn)?;
                let target = self.partition_for(&new_parent)?;
                if !Arc::ptr_eq(&source, &target) {
                    return Err(DirectoryError::AffectsMultipleDsas);
                }
                let (entry, new_dn) =
                    source.move_and_rename(&ctx.dn, &new_parent, &new_rdn, delete_old_rdn)?;
                ctx.entry = Some(entry);
                ctx.new_dn = Some(new_dn);
                Ok(OpReply::Done)
            }
            Operation::Compare { attr, value } => {
                let entry = self.lookup(&ctx.dn, None)?;
                let matched = entry.get(&attr).is_some_and(|a| {
                    let case_ignore = self.registries.case_ignore(&attr);
                    a.values().iter().any(|v| v.matches(&value, case_ignore))
                });
                Ok(OpReply::Bool(matched))
            }
            Operation::HasEntry => Ok(OpReply::Bool(self.has_entry(&ctx.dn)?)),
            Operation::Bind => {
                // Anonymous binds carry the empty DN; named binds must
                // name an existing entry.
                if !ctx.dn.is_empty() && !self.has_entry(&ctx.dn)? {
                    return Err(DirectoryError::no_such_object(&ctx.dn));
                }
                Ok(OpReply::Done)
            }
        }
    }
}
