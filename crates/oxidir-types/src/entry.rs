//! Entries and attributes.
//!
//! An [`Entry`] maps attribute ids to value sets. Attribute lookup is
//! case-insensitive; value membership honors the attribute's matching rule
//! (folded into a `case_ignore` flag resolved from the schema). Partitions
//! own their entries and hand the pipeline cloned views, so interceptors
//! can rewrite what they see without mutating the store.

use std::collections::BTreeMap;
use std::fmt;

use oxidir_error::Result;

use crate::dn::Dn;
use crate::schema::Registries;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    id: String,
    norm_id: String,
    case_ignore: bool,
    values: Vec<Value>,
}

impl Attribute {
    pub fn new(id: &str) -> Attribute {
        Attribute {
            id: id.to_string(),
            norm_id: id.trim().to_ascii_lowercase(),
            case_ignore: true,
            values: Vec::new(),
        }
    }

    /// An attribute whose values keep their case (URLs, timestamps).
    pub fn case_exact(id: &str) -> Attribute {
        Attribute {
            case_ignore: false,
            ..Attribute::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn norm_id(&self) -> &str {
        &self.norm_id
    }

    pub fn case_ignore(&self) -> bool {
        self.case_ignore
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First value rendered as text, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.values.iter().find_map(Value::as_text)
    }

    /// Add a value; duplicates under the matching rule are dropped.
    pub fn push(&mut self, value: Value) {
        if !self.contains(&value) {
            self.values.push(value);
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| v.matches(value, self.case_ignore))
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.contains(&Value::text(text))
    }

    /// Remove a value under the matching rule; true when something left.
    pub fn remove(&mut self, value: &Value) -> bool {
        let before = self.values.len();
        let case_ignore = self.case_ignore;
        self.values.retain(|v| !v.matches(value, case_ignore));
        self.values.len() != before
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.id)?;
        for v in &self.values {
            write!(f, " {v}")?;
        }
        Ok(())
    }
}

/// One element of a modify operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modification {
    Add { attribute: String, values: Vec<Value> },
    Replace { attribute: String, values: Vec<Value> },
    /// Empty `values` removes the whole attribute.
    Remove { attribute: String, values: Vec<Value> },
}

impl Modification {
    pub fn attribute(&self) -> &str {
        match self {
            Modification::Add { attribute, .. }
            | Modification::Replace { attribute, .. }
            | Modification::Remove { attribute, .. } => attribute,
        }
    }

    /// The modification that undoes `self`, given the entry as it stood
    /// before `self` was applied. `None` when there is nothing to undo.
    pub fn inverse(&self, prior: &Entry) -> Option<Modification> {
        match self {
            Modification::Add { attribute, values } => {
                let introduced: Vec<Value> = match prior.get(attribute) {
                    Some(attr) => values
                        .iter()
                        .filter(|v| !attr.contains(v))
                        .cloned()
                        .collect(),
                    None => values.clone(),
                };
                if introduced.is_empty() {
                    return None;
                }
                Some(Modification::Remove {
                    attribute: attribute.clone(),
                    values: introduced,
                })
            }
            Modification::Remove { attribute, values } => {
                let attr = prior.get(attribute)?;
                let restored: Vec<Value> = if values.is_empty() {
                    attr.values().to_vec()
                } else {
                    values.iter().filter(|v| attr.contains(v)).cloned().collect()
                };
                if restored.is_empty() {
                    return None;
                }
                Some(Modification::Add {
                    attribute: attribute.clone(),
                    values: restored,
                })
            }
            Modification::Replace { attribute, .. } => match prior.get(attribute) {
                Some(attr) => Some(Modification::Replace {
                    attribute: attribute.clone(),
                    values: attr.values().to_vec(),
                }),
                None => Some(Modification::Remove {
                    attribute: attribute.clone(),
                    values: Vec::new(),
                }),
            },
        }
    }
}

/// A directory entry: a DN plus its attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    attributes: BTreeMap<String, Attribute>,
}

impl Entry {
    pub fn new(dn: Dn) -> Entry {
        Entry {
            dn,
            attributes: BTreeMap::new(),
        }
    }

    /// Build an entry from `(id, value)` pairs, resolving canonical ids
    /// and matching rules through the registries.
    pub fn from_attrs<'a, I>(dn: Dn, pairs: I, registries: &Registries) -> Entry
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entry = Entry::new(dn);
        for (id, value) in pairs {
            entry.add_value_with(id, Value::text(value), registries);
        }
        entry
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    pub fn get(&self, id: &str) -> Option<&Attribute> {
        self.attributes.get(&id.trim().to_ascii_lowercase())
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// First text value of an attribute, if present.
    pub fn first(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Attribute::first_text)
    }

    /// Replace the attribute with the given values.
    pub fn put<I>(&mut self, id: &str, values: I)
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut attr = Attribute::new(id);
        for v in values {
            attr.push(v.into());
        }
        self.attributes.insert(attr.norm_id.clone(), attr);
    }

    /// Add one value, creating the attribute with its schema-resolved
    /// canonical id and matching rule when absent.
    pub fn add_value_with(&mut self, id: &str, value: Value, registries: &Registries) {
        let canonical = registries.canonical_attribute_name(id);
        let attr = self.attributes.entry(canonical.clone()).or_insert_with(|| {
            let mut a = if registries.case_ignore(id) {
                Attribute::new(id)
            } else {
                Attribute::case_exact(id)
            };
            a.norm_id = canonical;
            a
        });
        attr.push(value);
    }

    pub fn add_value(&mut self, id: &str, value: Value) {
        let key = id.trim().to_ascii_lowercase();
        self.attributes
            .entry(key)
            .or_insert_with(|| Attribute::new(id))
            .push(value);
    }

    pub fn remove_attribute(&mut self, id: &str) -> Option<Attribute> {
        self.attributes.remove(&id.trim().to_ascii_lowercase())
    }

    /// Remove one value; drops the attribute when its value set empties.
    pub fn remove_value(&mut self, id: &str, value: &Value) -> bool {
        let key = id.trim().to_ascii_lowercase();
        let Some(attr) = self.attributes.get_mut(&key) else {
            return false;
        };
        let removed = attr.remove(value);
        if attr.is_empty() {
            self.attributes.remove(&key);
        }
        removed
    }

    pub fn object_classes(&self) -> Vec<&str> {
        self.get("objectClass")
            .map(|a| a.values().iter().filter_map(Value::as_text).collect())
            .unwrap_or_default()
    }

    pub fn has_object_class(&self, name: &str) -> bool {
        self.get("objectClass")
            .is_some_and(|a| a.contains_text(name))
    }

    /// Apply a modify operation in order. Removing values or attributes
    /// that are already absent is a no-op, so replayed modifications stay
    /// idempotent.
    pub fn apply_modifications(&mut self, mods: &[Modification]) -> Result<()> {
        for m in mods {
            match m {
                Modification::Add { attribute, values } => {
                    for v in values {
                        self.add_value(attribute, v.clone());
                    }
                }
                Modification::Replace { attribute, values } => {
                    if values.is_empty() {
                        self.remove_attribute(attribute);
                    } else {
                        self.put(attribute, values.iter().cloned());
                    }
                }
                Modification::Remove { attribute, values } => {
                    if values.is_empty() {
                        self.remove_attribute(attribute);
                    } else {
                        for v in values {
                            self.remove_value(attribute, v);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Keep only the named attributes. `None` keeps everything.
    #[must_use]
    pub fn project(&self, attrs: Option<&[String]>) -> Entry {
        let Some(attrs) = attrs else {
            return self.clone();
        };
        let wanted: Vec<String> = attrs.iter().map(|a| a.trim().to_ascii_lowercase()).collect();
        let mut out = Entry::new(self.dn.clone());
        for (key, attr) in &self.attributes {
            if wanted.iter().any(|w| w == key) {
                out.attributes.insert(key.clone(), attr.clone());
            }
        }
        out
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dn: {}", self.dn)?;
        for attr in self.attributes.values() {
            writeln!(f, "{attr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Entry {
        let mut e = Entry::new(Dn::parse("cn=Jack Daniels,ou=Engineering").unwrap());
        e.put("objectClass", ["top", "person"]);
        e.put("cn", ["Jack Daniels"]);
        e.put("sn", ["Daniels"]);
        e
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let e = person();
        assert!(e.get("CN").is_some());
        assert!(e.get("ObjectClass").is_some());
        assert_eq!(e.first("cn"), Some("Jack Daniels"));
    }

    #[test]
    fn test_object_class_membership_ignores_case() {
        let e = person();
        assert!(e.has_object_class("PERSON"));
        assert!(e.has_object_class("Top"));
        assert!(!e.has_object_class("referral"));
    }

    #[test]
    fn test_value_dedup_under_matching_rule() {
        let mut e = person();
        e.add_value("cn", Value::text("JACK DANIELS"));
        assert_eq!(e.get("cn").unwrap().len(), 1);
    }

    #[test]
    fn test_modify_add_remove_round_trip() {
        let mut e = person();
        let mods = vec![Modification::Add {
            attribute: "description".to_string(),
            values: vec![Value::text("whiskey")],
        }];
        let inverse = mods[0].inverse(&e);
        e.apply_modifications(&mods).unwrap();
        assert_eq!(e.first("description"), Some("whiskey"));

        e.apply_modifications(&[inverse.unwrap()]).unwrap();
        assert!(e.get("description").is_none());
    }

    #[test]
    fn test_replace_inverse_restores_prior_values() {
        let mut e = person();
        let m = Modification::Replace {
            attribute: "sn".to_string(),
            values: vec![Value::text("Walker")],
        };
        let inverse = m.inverse(&e).unwrap();
        e.apply_modifications(std::slice::from_ref(&m)).unwrap();
        assert_eq!(e.first("sn"), Some("Walker"));

        e.apply_modifications(&[inverse]).unwrap();
        assert_eq!(e.first("sn"), Some("Daniels"));
    }

    #[test]
    fn test_add_inverse_only_removes_introduced_values() {
        let mut e = person();
        let m = Modification::Add {
            attribute: "sn".to_string(),
            values: vec![Value::text("DANIELS"), Value::text("Dickel")],
        };
        // "DANIELS" already present under caseIgnore, only "Dickel" is new.
        let inverse = m.inverse(&e).unwrap();
        assert_eq!(
            inverse,
            Modification::Remove {
                attribute: "sn".to_string(),
                values: vec![Value::text("Dickel")],
            }
        );
        e.apply_modifications(&[m]).unwrap();
        e.apply_modifications(&[inverse]).unwrap();
        assert_eq!(e.get("sn").unwrap().len(), 1);
        assert!(e.get("sn").unwrap().contains_text("Daniels"));
    }

    #[test]
    fn test_projection() {
        let e = person();
        let projected = e.project(Some(&["cn".to_string()]));
        assert!(projected.get("cn").is_some());
        assert!(projected.get("sn").is_none());
        assert_eq!(e.project(None).attribute_count(), 3);
    }

    #[test]
    fn test_schema_aware_build_canonicalizes_ids() {
        let reg = Registries::core_schema();
        let e = Entry::from_attrs(
            Dn::parse("cn=X").unwrap(),
            [("commonName", "X"), ("objectClass", "person")],
            &reg,
        );
        assert!(e.get("cn").is_some());
        assert_eq!(e.get("cn").unwrap().norm_id(), "cn");
    }
}
