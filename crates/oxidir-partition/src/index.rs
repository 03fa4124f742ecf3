//! Per-attribute value indexes.
//!
//! An index maps a normalized attribute value to the set of entry ids
//! carrying it. Candidate sets come back ordered by entry id, which is
//! the order index-driven cursors yield entries in. The candidate count
//! is what the search planner compares when choosing a join driver.

use std::collections::{BTreeMap, BTreeSet};

use oxidir_types::{Filter, Registries};

/// Entry ids are `entryUUID` values; they sort in allocation order.
pub type EntryId = String;

#[derive(Debug, Default)]
pub struct AttributeIndex {
    values: BTreeMap<String, BTreeSet<EntryId>>,
}

impl AttributeIndex {
    pub fn new() -> AttributeIndex {
        AttributeIndex::default()
    }

    pub fn insert(&mut self, norm_value: &str, id: &str) {
        self.values
            .entry(norm_value.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn remove(&mut self, norm_value: &str, id: &str) {
        if let Some(ids) = self.values.get_mut(norm_value) {
            ids.remove(id);
            if ids.is_empty() {
                self.values.remove(norm_value);
            }
        }
    }

    /// Ids of entries carrying exactly this normalized value.
    pub fn lookup(&self, norm_value: &str) -> BTreeSet<EntryId> {
        self.values.get(norm_value).cloned().unwrap_or_default()
    }

    /// Ids of entries carrying any value, in id order.
    pub fn all(&self) -> BTreeSet<EntryId> {
        self.values.values().flatten().cloned().collect()
    }

    /// Ids of entries with a value starting with `norm_prefix`.
    pub fn with_prefix(&self, norm_prefix: &str) -> BTreeSet<EntryId> {
        self.values
            .range(norm_prefix.to_string()..)
            .take_while(|(value, _)| value.starts_with(norm_prefix))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Candidate set for a leaf filter on this index's attribute, or
    /// `None` when this index cannot answer it exactly. The set stands in
    /// for the branch's own evaluation, so only exact answers qualify:
    /// presence, equality, and prefix-only substrings.
    pub fn candidates(&self, filter: &Filter, attr: &str, registries: &Registries) -> Option<BTreeSet<EntryId>> {
        match filter {
            Filter::Present { attr: fattr } if eq_attr(fattr, attr, registries) => Some(self.all()),
            Filter::Equality { attr: fattr, value } if eq_attr(fattr, attr, registries) => {
                Some(self.lookup(&registries.normalize_value(attr, value)))
            }
            Filter::Substring {
                attr: fattr,
                initial: Some(prefix),
                any,
                final_: None,
            } if any.is_empty() && eq_attr(fattr, attr, registries) => {
                Some(self.with_prefix(&registries.normalize_value(attr, prefix)))
            }
            _ => None,
        }
    }
}

fn eq_attr(a: &str, b: &str, registries: &Registries) -> bool {
    registries.canonical_attribute_name(a) == registries.canonical_attribute_name(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> AttributeIndex {
        let mut idx = AttributeIndex::new();
        idx.insert("johnny walker", "00000000-0000-0000-0000-000000000005");
        idx.insert("jim bean", "00000000-0000-0000-0000-000000000006");
        idx.insert("jack daniels", "00000000-0000-0000-0000-000000000008");
        idx
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut idx = index();
        assert_eq!(idx.lookup("jim bean").len(), 1);
        idx.remove("jim bean", "00000000-0000-0000-0000-000000000006");
        assert!(idx.lookup("jim bean").is_empty());
    }

    #[test]
    fn test_prefix_scan_orders_by_id() {
        let idx = index();
        let ids: Vec<EntryId> = idx.with_prefix("j").into_iter().collect();
        assert_eq!(
            ids,
            vec![
                "00000000-0000-0000-0000-000000000005".to_string(),
                "00000000-0000-0000-0000-000000000006".to_string(),
                "00000000-0000-0000-0000-000000000008".to_string(),
            ]
        );
        assert_eq!(idx.with_prefix("jo").len(), 1);
    }

    #[test]
    fn test_candidates_for_leaves() {
        let idx = index();
        let reg = Registries::core_schema();
        let prefix = Filter::parse("(cn=J*)").unwrap();
        assert_eq!(idx.candidates(&prefix, "cn", &reg).unwrap().len(), 3);

        let eq = Filter::parse("(cn=Jack Daniels)").unwrap();
        assert_eq!(idx.candidates(&eq, "cn", &reg).unwrap().len(), 1);

        let other_attr = Filter::parse("(sn=J*)").unwrap();
        assert!(idx.candidates(&other_attr, "cn", &reg).is_none());

        // Substrings with tail pieces cannot be answered exactly here.
        let inexact = Filter::parse("(cn=J*s)").unwrap();
        assert!(idx.candidates(&inexact, "cn", &reg).is_none());

        let connective = Filter::parse("(&(cn=J*)(sn=*))").unwrap();
        assert!(idx.candidates(&connective, "cn", &reg).is_none());
    }
}
