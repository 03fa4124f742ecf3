//! In-memory partition.
//!
//! Entries live in an ordered tree keyed by the root-first normalized RDN
//! path, so a subtree is one contiguous key range. A side table maps
//! `entryUUID` to tree keys for index-driven access, and per-attribute
//! value indexes feed the search planner.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use oxidir_error::{DirectoryError, Result};
use oxidir_types::{Dn, Entry, Filter, Modification, Rdn, Registries, SearchScope, Value};

use crate::and_cursor::AndCursor;
use crate::cursor::{EntryCursor, ListCursor};
use crate::evaluator::{Evaluator, FilterEvaluator};
use crate::index::{AttributeIndex, EntryId};
use crate::traits::Partition;

type PathKey = Vec<String>;

#[derive(Default)]
struct Store {
    entries: std::collections::BTreeMap<PathKey, Entry>,
    by_id: std::collections::BTreeMap<EntryId, PathKey>,
    indexes: HashMap<String, AttributeIndex>,
}

impl Store {
    fn subtree_keys(&self, base: &[String]) -> Vec<PathKey> {
        self.entries
            .range(base.to_vec()..)
            .take_while(|(key, _)| key.starts_with(base))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn entry_by_id(&self, id: &str) -> Option<&Entry> {
        self.by_id.get(id).and_then(|key| self.entries.get(key))
    }
}

pub struct AvlPartition {
    id: String,
    suffix: Dn,
    registries: Arc<Registries>,
    store: RwLock<Store>,
}

impl AvlPartition {
    pub fn new(id: &str, suffix: Dn, registries: Arc<Registries>) -> AvlPartition {
        let suffix = suffix.normalize(&registries);
        AvlPartition {
            id: id.to_string(),
            suffix,
            registries,
            store: RwLock::new(Store::default()),
        }
    }

    /// Maintain a value index for the attribute. Call before loading data.
    pub fn add_index(&self, attr: &str) {
        let canonical = self.registries.canonical_attribute_name(attr);
        self.store
            .write()
            .indexes
            .entry(canonical)
            .or_insert_with(AttributeIndex::new);
    }

    pub fn entry_count(&self) -> usize {
        self.store.read().entries.len()
    }

    /// Build an entry cursor for a filter over the whole partition,
    /// index-driven where possible.
    pub fn filter_cursor(&self, filter: &Filter) -> Result<EntryCursor> {
        let store = self.store.read();
        if let Some(cursor) = self.plan_indexed(&store, filter) {
            return Ok(cursor);
        }
        let evaluator = FilterEvaluator::new(filter.clone(), self.registries.clone());
        let mut hits = Vec::new();
        for entry in store.entries.values() {
            if evaluator.evaluate(entry)? {
                hits.push(entry.clone());
            }
        }
        Ok(Box::new(ListCursor::new(hits)))
    }

    /// Index-driven conjunction: the branch with the smallest candidate
    /// set drives, the rest evaluate. `None` when no index can answer.
    fn plan_indexed(&self, store: &Store, filter: &Filter) -> Option<EntryCursor> {
        let children: &[Filter] = match filter {
            Filter::And(children) => children,
            leaf => std::slice::from_ref(leaf),
        };

        let mut best: Option<(usize, std::collections::BTreeSet<EntryId>)> = None;
        for (idx, child) in children.iter().enumerate() {
            let Some(attr) = child.leaf_attr() else {
                continue;
            };
            let canonical = self.registries.canonical_attribute_name(attr);
            let Some(index) = store.indexes.get(&canonical) else {
                continue;
            };
            let Some(set) = index.candidates(child, &canonical, &self.registries) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, b)| set.len() < b.len()) {
                best = Some((idx, set));
            }
        }

        let (driver_idx, ids) = best?;
        debug!(
            driver = %children[driver_idx],
            candidates = ids.len(),
            "index-driven search: cheapest branch drives"
        );

        let entries: Vec<Entry> = ids
            .iter()
            .filter_map(|id| store.entry_by_id(id).cloned())
            .collect();
        let evaluators: Vec<Box<dyn Evaluator>> = children
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != driver_idx)
            .map(|(_, f)| {
                Box::new(FilterEvaluator::new(f.clone(), self.registries.clone()))
                    as Box<dyn Evaluator>
            })
            .collect();
        Some(Box::new(AndCursor::new(
            Box::new(ListCursor::new(entries)),
            evaluators,
        )))
    }

    fn uuid_of(entry: &Entry) -> Result<EntryId> {
        entry
            .first("entryUUID")
            .map(str::to_string)
            .ok_or_else(|| DirectoryError::unwilling("entry carries no entryUUID"))
    }

    fn index_entry(registries: &Registries, indexes: &mut HashMap<String, AttributeIndex>, entry: &Entry, id: &str) {
        for (attr, index) in indexes.iter_mut() {
            if let Some(a) = entry.get(attr) {
                for value in a.values().iter().filter_map(Value::as_text) {
                    index.insert(&registries.normalize_value(attr, value), id);
                }
            }
        }
    }

    fn unindex_entry(registries: &Registries, indexes: &mut HashMap<String, AttributeIndex>, entry: &Entry, id: &str) {
        for (attr, index) in indexes.iter_mut() {
            if let Some(a) = entry.get(attr) {
                for value in a.values().iter().filter_map(Value::as_text) {
                    index.remove(&registries.normalize_value(attr, value), id);
                }
            }
        }
    }

    fn require_within_suffix(&self, dn: &Dn) -> Result<()> {
        if dn.is_within(&self.suffix) {
            Ok(())
        } else {
            Err(DirectoryError::naming_violation(format!(
                "'{dn}' is outside partition suffix '{}'",
                self.suffix
            )))
        }
    }

    /// Rekey a whole subtree from `old_dn` to `new_dn`, applying `surgery`
    /// to the moved apex entry while it is out of the tree.
    fn rekey_subtree(
        &self,
        store: &mut Store,
        old_dn: &Dn,
        new_dn: &Dn,
        surgery: impl FnOnce(&Registries, &mut HashMap<String, AttributeIndex>, &mut Entry, &str),
    ) -> Result<Entry> {
        let old_key = old_dn.path_key();
        let new_key = new_dn.path_key();

        if store.entries.contains_key(&new_key) {
            return Err(DirectoryError::already_exists(new_dn));
        }

        // The apex sorts first in its own key range.
        let keys = store.subtree_keys(&old_key);
        if keys.first() != Some(&old_key) {
            return Err(DirectoryError::no_such_object(old_dn));
        }
        let mut moved: Vec<Entry> = keys
            .iter()
            .map(|key| store.entries.remove(key).expect("key just listed"))
            .collect();

        let mut apex = moved.remove(0);
        let apex_id = Self::uuid_of(&apex)?;
        surgery(&self.registries, &mut store.indexes, &mut apex, &apex_id);
        apex.set_dn(new_dn.clone());
        store.by_id.insert(apex_id, new_key.clone());
        let result = apex.clone();
        store.entries.insert(new_key, apex);

        for mut entry in moved {
            let id = Self::uuid_of(&entry)?;
            let rebased = entry.dn().rebase(old_dn, new_dn)?;
            entry.set_dn(rebased);
            let key = entry.dn().path_key();
            store.by_id.insert(id, key.clone());
            store.entries.insert(key, entry);
        }

        Ok(result)
    }
}

impl Partition for AvlPartition {
    fn id(&self) -> &str {
        &self.id
    }

    fn suffix(&self) -> &Dn {
        &self.suffix
    }

    fn add(&self, entry: Entry) -> Result<()> {
        let dn = entry.dn().clone();
        self.require_within_suffix(&dn)?;
        let key = dn.path_key();
        let mut store = self.store.write();

        if store.entries.contains_key(&key) {
            return Err(DirectoryError::already_exists(&dn));
        }
        if dn != self.suffix {
            let parent = dn.parent().expect("non-suffix DN has a parent");
            if !store.entries.contains_key(&parent.path_key()) {
                return Err(DirectoryError::no_such_object(&parent));
            }
        }

        let id = Self::uuid_of(&entry)?;
        Self::index_entry(&self.registries, &mut store.indexes, &entry, &id);
        store.by_id.insert(id, key.clone());
        store.entries.insert(key, entry);
        Ok(())
    }

    fn delete(&self, dn: &Dn) -> Result<Entry> {
        self.require_within_suffix(dn)?;
        let key = dn.path_key();
        let mut store = self.store.write();

        if !store.entries.contains_key(&key) {
            return Err(DirectoryError::no_such_object(dn));
        }
        if store.subtree_keys(&key).len() > 1 {
            return Err(DirectoryError::unwilling(format!(
                "'{dn}' has children; delete is not allowed on non-leaf entries"
            )));
        }

        let entry = store.entries.remove(&key).expect("presence checked");
        let id = Self::uuid_of(&entry)?;
        Self::unindex_entry(&self.registries, &mut store.indexes, &entry, &id);
        store.by_id.remove(&id);
        Ok(entry)
    }

    fn modify(&self, dn: &Dn, mods: &[Modification]) -> Result<Entry> {
        self.require_within_suffix(dn)?;
        let key = dn.path_key();
        let mut store = self.store.write();

        let prior = store
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| DirectoryError::no_such_object(dn))?;
        let mut updated = prior.clone();
        updated.apply_modifications(mods)?;

        let id = Self::uuid_of(&prior)?;
        Self::unindex_entry(&self.registries, &mut store.indexes, &prior, &id);
        Self::index_entry(&self.registries, &mut store.indexes, &updated, &id);
        store.entries.insert(key, updated.clone());
        Ok(updated)
    }

    fn lookup(&self, dn: &Dn, attrs: Option<&[String]>) -> Result<Entry> {
        self.require_within_suffix(dn)?;
        let store = self.store.read();
        store
            .entries
            .get(&dn.path_key())
            .map(|entry| entry.project(attrs))
            .ok_or_else(|| DirectoryError::no_such_object(dn))
    }

    fn has_entry(&self, dn: &Dn) -> Result<bool> {
        if !dn.is_within(&self.suffix) {
            return Ok(false);
        }
        Ok(self.store.read().entries.contains_key(&dn.path_key()))
    }

    fn search(&self, base: &Dn, scope: SearchScope, filter: &Filter) -> Result<EntryCursor> {
        self.require_within_suffix(base)?;
        let store = self.store.read();
        let base_key = base.path_key();
        if !store.entries.contains_key(&base_key) {
            return Err(DirectoryError::no_such_object(base));
        }

        // Subtree scans from the suffix can use the value indexes.
        if scope == SearchScope::Subtree && *base == self.suffix {
            if let Some(cursor) = self.plan_indexed(&store, filter) {
                return Ok(cursor);
            }
        }

        let evaluator = FilterEvaluator::new(filter.clone(), self.registries.clone());
        let mut hits = Vec::new();
        for key in store.subtree_keys(&base_key) {
            let depth = key.len() - base_key.len();
            let in_scope = match scope {
                SearchScope::Base => depth == 0,
                SearchScope::OneLevel => depth == 1,
                SearchScope::Subtree => true,
            };
            if !in_scope {
                continue;
            }
            let entry = &store.entries[&key];
            if evaluator.evaluate(entry)? {
                hits.push(entry.clone());
            }
        }
        Ok(Box::new(ListCursor::new(hits)))
    }

    fn rename(&self, dn: &Dn, new_rdn: &Rdn, delete_old_rdn: bool) -> Result<(Entry, Dn)> {
        self.require_within_suffix(dn)?;
        if *dn == self.suffix {
            return Err(DirectoryError::unwilling(
                "cannot rename the partition suffix",
            ));
        }
        let old_rdn = dn
            .rdn()
            .cloned()
            .ok_or_else(|| DirectoryError::naming_violation("cannot rename the root DSE"))?;
        let new_dn = dn.with_rdn(new_rdn)?.normalize(&self.registries);

        let mut store = self.store.write();
        let new_rdn = new_rdn.clone();
        let entry = self.rekey_subtree(&mut store, dn, &new_dn, |registries, indexes, entry, id| {
            Self::unindex_entry(registries, indexes, entry, id);
            if delete_old_rdn {
                for ava in old_rdn.avas() {
                    entry.remove_value(ava.attr(), &Value::text(ava.value()));
                }
            }
            for ava in new_rdn.avas() {
                entry.add_value(ava.attr(), Value::text(ava.value()));
            }
            Self::index_entry(registries, indexes, entry, id);
        })?;
        Ok((entry, new_dn))
    }

    fn move_entry(&self, dn: &Dn, new_parent: &Dn) -> Result<(Entry, Dn)> {
        self.require_within_suffix(dn)?;
        self.require_within_suffix(new_parent)?;
        if *dn == self.suffix {
            return Err(DirectoryError::unwilling("cannot move the partition suffix"));
        }
        let new_dn = dn.moved_under(new_parent)?.normalize(&self.registries);

        let mut store = self.store.write();
        if !store.entries.contains_key(&new_parent.path_key()) {
            return Err(DirectoryError::no_such_object(new_parent));
        }
        let entry = self.rekey_subtree(&mut store, dn, &new_dn, |_, _, _, _| {})?;
        Ok((entry, new_dn))
    }

    fn move_and_rename(
        &self,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
    ) -> Result<(Entry, Dn)> {
        self.require_within_suffix(dn)?;
        self.require_within_suffix(new_parent)?;
        if *dn == self.suffix {
            return Err(DirectoryError::unwilling("cannot move the partition suffix"));
        }
        let old_rdn = dn
            .rdn()
            .cloned()
            .ok_or_else(|| DirectoryError::naming_violation("cannot move the root DSE"))?;
        let new_dn = new_parent.child(new_rdn).normalize(&self.registries);

        let mut store = self.store.write();
        if !store.entries.contains_key(&new_parent.path_key()) {
            return Err(DirectoryError::no_such_object(new_parent));
        }
        let new_rdn = new_rdn.clone();
        let entry = self.rekey_subtree(&mut store, dn, &new_dn, |registries, indexes, entry, id| {
            Self::unindex_entry(registries, indexes, entry, id);
            if delete_old_rdn {
                for ava in old_rdn.avas() {
                    entry.remove_value(ava.attr(), &Value::text(ava.value()));
                }
            }
            for ava in new_rdn.avas() {
                entry.add_value(ava.attr(), Value::text(ava.value()));
            }
            Self::index_entry(registries, indexes, entry, id);
        })?;
        Ok((entry, new_dn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor as _;

    fn uuid(n: u32) -> String {
        format!("00000000-0000-0000-0000-{n:012}")
    }

    fn entry(reg: &Registries, dn: &str, n: u32, pairs: &[(&str, &str)]) -> Entry {
        let dn = Dn::parse(dn).unwrap().normalize(reg);
        let mut e = Entry::from_attrs(dn, pairs.iter().copied(), reg);
        let id = uuid(n);
        e.add_value_with("entryUUID", Value::text(id), reg);
        e
    }

    fn partition() -> AvlPartition {
        let reg = Arc::new(Registries::core_schema());
        let p = AvlPartition::new("example", Dn::parse("o=Good Times Co.").unwrap(), reg.clone());
        p.add_index("cn");
        p.add_index("ou");
        p.add(entry(
            &reg,
            "o=Good Times Co.",
            1,
            &[("objectClass", "organization"), ("o", "Good Times Co.")],
        ))
        .unwrap();
        p.add(entry(
            &reg,
            "ou=Sales,o=Good Times Co.",
            2,
            &[("objectClass", "organizationalUnit"), ("ou", "Sales")],
        ))
        .unwrap();
        p.add(entry(
            &reg,
            "cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.",
            5,
            &[
                ("objectClass", "person"),
                ("cn", "JOhnny WAlkeR"),
                ("sn", "WAlkeR"),
            ],
        ))
        .unwrap();
        p
    }

    #[test]
    fn test_add_then_lookup() {
        let p = partition();
        let dn = Dn::parse("cn=johnny walker,ou=sales,o=good times co.").unwrap();
        let e = p.lookup(&dn, None).unwrap();
        assert_eq!(e.first("cn"), Some("JOhnny WAlkeR"));
    }

    #[test]
    fn test_add_requires_parent() {
        let p = partition();
        let reg = Registries::core_schema();
        let orphan = entry(
            &reg,
            "cn=X,ou=Missing,o=Good Times Co.",
            99,
            &[("objectClass", "person"), ("cn", "X"), ("sn", "X")],
        );
        assert!(matches!(
            p.add(orphan),
            Err(DirectoryError::NoSuchObject { .. })
        ));
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let p = partition();
        let reg = Registries::core_schema();
        let dup = entry(
            &reg,
            "ou=Sales,o=Good Times Co.",
            100,
            &[("objectClass", "organizationalUnit"), ("ou", "Sales")],
        );
        assert!(matches!(
            p.add(dup),
            Err(DirectoryError::EntryAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_delete_non_leaf_rejected() {
        let p = partition();
        let dn = Dn::parse("ou=Sales,o=Good Times Co.").unwrap();
        assert!(matches!(
            p.delete(&dn),
            Err(DirectoryError::UnwillingToPerform { .. })
        ));
    }

    #[test]
    fn test_delete_leaf_updates_indexes() {
        let p = partition();
        let dn = Dn::parse("cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.").unwrap();
        p.delete(&dn).unwrap();
        assert!(!p.has_entry(&dn).unwrap());

        let mut cursor = p
            .filter_cursor(&Filter::parse("(cn=J*)").unwrap())
            .unwrap();
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_modify_reindexes() {
        let p = partition();
        let dn = Dn::parse("cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.").unwrap();
        p.modify(
            &dn,
            &[Modification::Add {
                attribute: "cn".to_string(),
                values: vec![Value::text("Johnny Red")],
            }],
        )
        .unwrap();

        let mut cursor = p
            .filter_cursor(&Filter::parse("(cn=Johnny Red)").unwrap())
            .unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get().unwrap().first("sn"), Some("WAlkeR"));
    }

    #[test]
    fn test_scope_boundaries() {
        let p = partition();
        let base = Dn::parse("o=Good Times Co.").unwrap();
        let all = Filter::parse("(objectClass=*)").unwrap();

        let mut base_cursor = p.search(&base, SearchScope::Base, &all).unwrap();
        assert!(base_cursor.next().unwrap());
        assert!(!base_cursor.next().unwrap());

        let mut one = p.search(&base, SearchScope::OneLevel, &all).unwrap();
        assert!(one.next().unwrap());
        assert_eq!(one.get().unwrap().first("ou"), Some("Sales"));
        assert!(!one.next().unwrap());

        let mut sub = p.search(&base, SearchScope::Subtree, &all).unwrap();
        let mut count = 0;
        while sub.next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_search_missing_base() {
        let p = partition();
        let base = Dn::parse("ou=Nowhere,o=Good Times Co.").unwrap();
        assert!(matches!(
            p.search(&base, SearchScope::Subtree, &Filter::present("objectClass")),
            Err(DirectoryError::NoSuchObject { .. })
        ));
    }

    #[test]
    fn test_rename_rekeys_and_rewrites_rdn_attribute() {
        let p = partition();
        let dn = Dn::parse("cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.").unwrap();
        let new_rdn = Rdn::parse("cn=John Walker").unwrap();
        let (entry, new_dn) = p.rename(&dn, &new_rdn, true).unwrap();

        assert_eq!(new_dn.norm(), "cn=john walker,ou=sales,o=good times co.");
        assert!(!p.has_entry(&dn).unwrap());
        assert!(p.has_entry(&new_dn).unwrap());
        assert!(entry.get("cn").unwrap().contains_text("John Walker"));
        assert!(!entry.get("cn").unwrap().contains_text("JOhnny WAlkeR"));
    }

    #[test]
    fn test_move_rekeys_descendants() {
        let reg = Arc::new(Registries::core_schema());
        let p = partition();
        p.add(entry(
            &reg,
            "ou=Engineering,o=Good Times Co.",
            4,
            &[("objectClass", "organizationalUnit"), ("ou", "Engineering")],
        ))
        .unwrap();

        let dn = Dn::parse("ou=Sales,o=Good Times Co.").unwrap();
        let new_parent = Dn::parse("ou=Engineering,o=Good Times Co.").unwrap();
        let (_, new_dn) = p.move_entry(&dn, &new_parent).unwrap();
        assert_eq!(new_dn.norm(), "ou=sales,ou=engineering,o=good times co.");

        let child = Dn::parse("cn=JOhnny WAlkeR,ou=Sales,ou=Engineering,o=Good Times Co.").unwrap();
        assert!(p.has_entry(&child).unwrap());
    }
}
