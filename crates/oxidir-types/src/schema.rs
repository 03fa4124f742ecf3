//! Schema registries: attribute types, object classes, normalizers.
//!
//! The pipeline consumes a deliberately small slice of the LDAP schema
//! model: name/OID resolution, per-syntax value normalization, and object
//! class membership. Matching-rule behavior is folded into
//! [`AttributeType::case_ignore`], which is all the equality and substring
//! evaluators need.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dn::{default_normalize, Dn};

/// How values of an attribute type compare and normalize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchingKind {
    /// caseIgnoreMatch family: trim, collapse whitespace, fold case.
    CaseIgnore,
    /// caseExactMatch family: trim only. LDAP URLs and octet-ish strings.
    CaseExact,
}

#[derive(Clone, Debug)]
pub struct AttributeType {
    oid: String,
    /// Names in preference order; the first is canonical.
    names: Vec<String>,
    matching: MatchingKind,
    single_value: bool,
}

impl AttributeType {
    pub fn new(oid: &str, names: &[&str], matching: MatchingKind) -> AttributeType {
        AttributeType {
            oid: oid.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
            matching,
            single_value: false,
        }
    }

    fn single_valued(mut self) -> AttributeType {
        self.single_value = true;
        self
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// The canonical (first registered) name, lowercased.
    pub fn canonical_name(&self) -> String {
        self.names[0].to_ascii_lowercase()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matching(&self) -> MatchingKind {
        self.matching
    }

    pub fn case_ignore(&self) -> bool {
        self.matching == MatchingKind::CaseIgnore
    }

    pub fn is_single_value(&self) -> bool {
        self.single_value
    }

    /// Normalize a value under this type's matching rule.
    pub fn normalize(&self, value: &str) -> String {
        match self.matching {
            MatchingKind::CaseIgnore => default_normalize(value),
            MatchingKind::CaseExact => value.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ObjectClass {
    name: String,
    must: Vec<String>,
}

impl ObjectClass {
    pub fn new(name: &str, must: &[&str]) -> ObjectClass {
        ObjectClass {
            name: name.to_string(),
            must: must.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute types every entry of this class must carry.
    pub fn must(&self) -> &[String] {
        &self.must
    }
}

/// Attribute-type and object-class registries, resolved by name or OID.
///
/// Lookups are case-insensitive. Unknown attribute types fall back to
/// case-ignore matching with the queried name as its own canonical name,
/// which is what extensible entries need.
#[derive(Debug)]
pub struct Registries {
    by_key: HashMap<String, Arc<AttributeType>>,
    object_classes: HashMap<String, ObjectClass>,
}

impl Registries {
    fn empty() -> Registries {
        Registries {
            by_key: HashMap::new(),
            object_classes: HashMap::new(),
        }
    }

    /// The core schema the server boots with.
    pub fn core_schema() -> Registries {
        let mut reg = Registries::empty();

        let types = [
            AttributeType::new("2.5.4.0", &["objectClass"], MatchingKind::CaseIgnore),
            AttributeType::new("2.5.4.3", &["cn", "commonName"], MatchingKind::CaseIgnore),
            AttributeType::new("2.5.4.4", &["sn", "surname"], MatchingKind::CaseIgnore),
            AttributeType::new("2.5.4.6", &["c", "countryName"], MatchingKind::CaseIgnore),
            AttributeType::new("2.5.4.10", &["o", "organizationName"], MatchingKind::CaseIgnore),
            AttributeType::new(
                "2.5.4.11",
                &["ou", "organizationalUnitName"],
                MatchingKind::CaseIgnore,
            ),
            AttributeType::new("2.5.4.13", &["description"], MatchingKind::CaseIgnore),
            AttributeType::new("0.9.2342.19200300.100.1.1", &["uid"], MatchingKind::CaseIgnore),
            AttributeType::new("0.9.2342.19200300.100.1.25", &["dc"], MatchingKind::CaseIgnore),
            // Referral URLs keep their case.
            AttributeType::new("2.16.840.1.113730.3.1.34", &["ref"], MatchingKind::CaseExact),
            AttributeType::new("1.3.6.1.1.16.4", &["entryUUID"], MatchingKind::CaseIgnore)
                .single_valued(),
            AttributeType::new("2.5.18.3", &["creatorsName"], MatchingKind::CaseIgnore)
                .single_valued(),
            AttributeType::new("2.5.18.1", &["createTimestamp"], MatchingKind::CaseExact)
                .single_valued(),
            AttributeType::new("1.3.6.1.4.1.1466.101.120.5", &["namingContexts"], MatchingKind::CaseIgnore),
            AttributeType::new("2.5.18.10", &["subschemaSubentry"], MatchingKind::CaseIgnore)
                .single_valued(),
            AttributeType::new("1.3.6.1.1.4", &["vendorName"], MatchingKind::CaseExact),
            AttributeType::new(
                "1.3.6.1.4.1.1466.101.120.15",
                &["supportedLDAPVersion"],
                MatchingKind::CaseExact,
            ),
            AttributeType::new("2.5.4.35", &["userPassword"], MatchingKind::CaseExact),
        ];

        for at in types {
            reg.register_attribute_type(at);
        }

        for oc in [
            ObjectClass::new("top", &["objectClass"]),
            ObjectClass::new("person", &["cn", "sn"]),
            ObjectClass::new("organization", &["o"]),
            ObjectClass::new("organizationalUnit", &["ou"]),
            ObjectClass::new("organizationalPerson", &["cn", "sn"]),
            ObjectClass::new("country", &["c"]),
            ObjectClass::new("domain", &["dc"]),
            ObjectClass::new("referral", &["ref"]),
            ObjectClass::new("extensibleObject", &[]),
            ObjectClass::new("subschema", &[]),
        ] {
            reg.register_object_class(oc);
        }

        reg
    }

    pub fn register_attribute_type(&mut self, at: AttributeType) {
        let at = Arc::new(at);
        self.by_key.insert(at.oid.to_ascii_lowercase(), at.clone());
        for name in &at.names {
            self.by_key.insert(name.to_ascii_lowercase(), at.clone());
        }
    }

    pub fn register_object_class(&mut self, oc: ObjectClass) {
        self.object_classes.insert(oc.name.to_ascii_lowercase(), oc);
    }

    /// Resolve an attribute type by any of its names or its OID.
    pub fn attribute_type(&self, id: &str) -> Option<&Arc<AttributeType>> {
        self.by_key.get(&id.trim().to_ascii_lowercase())
    }

    pub fn object_class(&self, name: &str) -> Option<&ObjectClass> {
        self.object_classes.get(&name.trim().to_ascii_lowercase())
    }

    /// The canonical lowercased name for an attribute id; unknown ids
    /// canonicalize to themselves.
    pub fn canonical_attribute_name(&self, id: &str) -> String {
        match self.attribute_type(id) {
            Some(at) => at.canonical_name(),
            None => id.trim().to_ascii_lowercase(),
        }
    }

    /// Normalize a value under the attribute's matching rule; unknown
    /// attributes normalize case-insensitively.
    pub fn normalize_value(&self, id: &str, value: &str) -> String {
        match self.attribute_type(id) {
            Some(at) => at.normalize(value),
            None => default_normalize(value),
        }
    }

    /// Whether values of this attribute compare case-insensitively.
    pub fn case_ignore(&self, id: &str) -> bool {
        self.attribute_type(id).map_or(true, |at| at.case_ignore())
    }

    /// The matching rule governing an attribute's equality; unknown
    /// attributes match case-insensitively.
    pub fn matching_rule(&self, id: &str) -> MatchingKind {
        self.attribute_type(id)
            .map_or(MatchingKind::CaseIgnore, |at| at.matching())
    }

    /// Parse and normalize a DN in one step.
    pub fn normalize_dn(&self, dn: &Dn) -> Dn {
        dn.normalize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        let reg = Registries::core_schema();
        let cn = reg.attribute_type("commonName").unwrap();
        assert_eq!(cn.oid(), "2.5.4.3");
        assert_eq!(reg.canonical_attribute_name("CommonName"), "cn");
        assert_eq!(reg.canonical_attribute_name("2.5.4.3"), "cn");
    }

    #[test]
    fn test_unknown_attribute_falls_back() {
        let reg = Registries::core_schema();
        assert_eq!(reg.canonical_attribute_name("favoriteDrink"), "favoritedrink");
        assert!(reg.case_ignore("favoriteDrink"));
    }

    #[test]
    fn test_ref_is_case_exact() {
        let reg = Registries::core_schema();
        assert!(!reg.case_ignore("ref"));
        assert_eq!(
            reg.normalize_value("ref", " ldap://HostD/ou=Roles "),
            "ldap://HostD/ou=Roles"
        );
    }

    #[test]
    fn test_dn_normalization_maps_aliases() {
        let reg = Registries::core_schema();
        let a = Dn::parse("commonName=Jack Daniels,ou=Engineering").unwrap();
        let b = Dn::parse("cn=jack daniels,ou=engineering").unwrap();
        assert_eq!(a.normalize(&reg), b.normalize(&reg));
    }

    #[test]
    fn test_normalize_idempotent() {
        let reg = Registries::core_schema();
        let dn = Dn::parse("CN=Jack  Daniels,OU=Engineering,O=Good Times Co.").unwrap();
        let once = dn.normalize(&reg);
        let twice = once.normalize(&reg);
        assert_eq!(once, twice);
        assert_eq!(once.norm(), twice.norm());
    }

    #[test]
    fn test_object_class_must() {
        let reg = Registries::core_schema();
        let referral = reg.object_class("REFERRAL").unwrap();
        assert_eq!(referral.must(), &["ref".to_string()]);
    }
}
