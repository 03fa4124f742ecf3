//! Distinguished names.
//!
//! A [`Dn`] is an ordered sequence of [`Rdn`]s, leaf-first as written
//! (`cn=X,ou=Y,ou=system` has `cn=X` at index 0). Every DN carries two
//! forms: the user-provided rendering (original casing and spacing) and a
//! normalized rendering used for all comparisons. Two DNs are equal exactly
//! when their normalized forms are byte-equal.
//!
//! Parsing applies a schema-unaware default normalization (lowercase,
//! whitespace-collapsed). [`Dn::normalize`] re-derives the normalized form
//! through the schema registries, mapping attribute aliases to their
//! canonical name and applying syntax-specific value normalizers; past the
//! normalization stage of the pipeline every DN has been through it.

use std::fmt;
use std::hash::{Hash, Hasher};

use oxidir_error::{DirectoryError, Result};

use crate::schema::Registries;

/// A single type=value assertion inside an RDN.
#[derive(Clone, Debug)]
pub struct Ava {
    attr: String,
    value: String,
    norm_attr: String,
    norm_value: String,
}

impl Ava {
    fn new(attr: &str, value: &str) -> Ava {
        Ava {
            attr: attr.to_string(),
            value: value.to_string(),
            norm_attr: attr.trim().to_ascii_lowercase(),
            norm_value: default_normalize(value),
        }
    }

    pub fn attr(&self) -> &str {
        &self.attr
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn norm_attr(&self) -> &str {
        &self.norm_attr
    }

    pub fn norm_value(&self) -> &str {
        &self.norm_value
    }
}

/// A relative distinguished name: an unordered set of AVAs, usually one.
#[derive(Clone, Debug)]
pub struct Rdn {
    avas: Vec<Ava>,
    user: String,
    norm: String,
}

impl Rdn {
    /// Parse a single RDN such as `cn=Jack Daniels` or `cn=J+sn=D`.
    pub fn parse(input: &str) -> Result<Rdn> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DirectoryError::naming_violation("empty RDN"));
        }

        let mut avas = Vec::new();
        for part in split_unescaped(trimmed, '+') {
            let part = part.trim();
            let (attr, value) = part
                .find('=')
                .map(|idx| (&part[..idx], &part[idx + 1..]))
                .ok_or_else(|| {
                    DirectoryError::naming_violation(format!("RDN without '=': '{part}'"))
                })?;
            let attr = attr.trim();
            let value = unescape(value.trim());
            if attr.is_empty() {
                return Err(DirectoryError::naming_violation(format!(
                    "RDN with empty attribute type: '{part}'"
                )));
            }
            avas.push(Ava::new(attr, &value));
        }

        Ok(Rdn::from_avas(avas, trimmed.to_string()))
    }

    fn from_avas(avas: Vec<Ava>, user: String) -> Rdn {
        let norm = render_norm(&avas);
        Rdn { avas, user, norm }
    }

    /// The attribute type of the first AVA.
    pub fn attr(&self) -> &str {
        &self.avas[0].attr
    }

    /// The value of the first AVA.
    pub fn value(&self) -> &str {
        &self.avas[0].value
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn norm(&self) -> &str {
        &self.norm
    }

    fn renormalize(&self, registries: &Registries) -> Rdn {
        let avas: Vec<Ava> = self
            .avas
            .iter()
            .map(|ava| {
                let canonical = registries.canonical_attribute_name(&ava.attr);
                let norm_value = registries.normalize_value(&canonical, &ava.value);
                Ava {
                    attr: ava.attr.clone(),
                    value: ava.value.clone(),
                    norm_attr: canonical,
                    norm_value,
                }
            })
            .collect();
        let norm = render_norm(&avas);
        Rdn {
            avas,
            user: self.user.clone(),
            norm,
        }
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}

/// Multi-valued RDNs normalize with their AVAs sorted, so the member order
/// the client chose does not affect equality.
fn render_norm(avas: &[Ava]) -> String {
    let mut parts: Vec<String> = avas
        .iter()
        .map(|ava| format!("{}={}", ava.norm_attr, ava.norm_value))
        .collect();
    parts.sort();
    parts.join("+")
}

/// A distinguished name. The empty DN denotes the root DSE.
#[derive(Clone, Debug, Default)]
pub struct Dn {
    rdns: Vec<Rdn>,
    user: String,
    norm: String,
}

impl Dn {
    /// The empty DN (root DSE).
    pub fn empty() -> Dn {
        Dn::default()
    }

    /// Parse a DN string. The empty string yields the empty DN.
    pub fn parse(input: &str) -> Result<Dn> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Dn::empty());
        }

        let mut rdns = Vec::new();
        for comp in split_unescaped(trimmed, ',') {
            rdns.push(Rdn::parse(comp)?);
        }
        Ok(Dn::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Dn {
        let user = rdns
            .iter()
            .map(|r| r.user.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let norm = rdns
            .iter()
            .map(|r| r.norm.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Dn { rdns, user, norm }
    }

    /// Re-derive the normalized form through the schema registries.
    ///
    /// Idempotent: normalizing an already-normalized DN returns an equal DN.
    #[must_use]
    pub fn normalize(&self, registries: &Registries) -> Dn {
        let rdns: Vec<Rdn> = self
            .rdns
            .iter()
            .map(|r| r.renormalize(registries))
            .collect();
        Dn::from_rdns(rdns)
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Number of RDN components.
    pub fn size(&self) -> usize {
        self.rdns.len()
    }

    /// The leaf (leftmost) RDN, if any.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The DN with the leaf RDN removed. The parent of a single-component
    /// DN is the empty DN; the empty DN has no parent.
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.is_empty() {
            return None;
        }
        Some(Dn::from_rdns(self.rdns[1..].to_vec()))
    }

    /// Prepend `rdn` as a new leaf under `self`.
    pub fn child(&self, rdn: &Rdn) -> Dn {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn.clone());
        rdns.extend(self.rdns.iter().cloned());
        Dn::from_rdns(rdns)
    }

    /// True when `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Dn) -> bool {
        if self.size() >= other.size() {
            return false;
        }
        let skip = other.size() - self.size();
        self.rdns
            .iter()
            .zip(other.rdns[skip..].iter())
            .all(|(a, b)| a.norm == b.norm)
    }

    /// True when `self` equals `other` or descends from it.
    pub fn is_within(&self, other: &Dn) -> bool {
        self == other || other.is_ancestor_of(self)
    }

    /// Translate `self` from the `old_suffix` namespace into `new_suffix`:
    /// the components of `self` above `old_suffix` are kept and grafted
    /// onto `new_suffix`. `self` must sit at or below `old_suffix`.
    pub fn rebase(&self, old_suffix: &Dn, new_suffix: &Dn) -> Result<Dn> {
        if !self.is_within(old_suffix) {
            return Err(DirectoryError::naming_violation(format!(
                "'{self}' is not under '{old_suffix}'"
            )));
        }
        let keep = self.size() - old_suffix.size();
        let mut rdns: Vec<Rdn> = self.rdns[..keep].to_vec();
        rdns.extend(new_suffix.rdns.iter().cloned());
        Ok(Dn::from_rdns(rdns))
    }

    /// Replace the leaf RDN, keeping the parent. Errors on the empty DN.
    pub fn with_rdn(&self, rdn: &Rdn) -> Result<Dn> {
        let parent = self
            .parent()
            .ok_or_else(|| DirectoryError::naming_violation("the root DSE has no RDN"))?;
        Ok(parent.child(rdn))
    }

    /// Move the whole subtree name under a new parent: the leaf RDN of
    /// `self` grafted onto `new_parent`.
    pub fn moved_under(&self, new_parent: &Dn) -> Result<Dn> {
        let rdn = self
            .rdn()
            .ok_or_else(|| DirectoryError::naming_violation("cannot move the root DSE"))?;
        Ok(new_parent.child(rdn))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn norm(&self) -> &str {
        &self.norm
    }

    /// Normalized RDN strings ordered root-first. Partitions key their
    /// trees on this path, and the referral trie walks it.
    pub fn path_key(&self) -> Vec<String> {
        self.rdns.iter().rev().map(|r| r.norm.clone()).collect()
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Dn) -> bool {
        self.norm == other.norm
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm.hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}

impl std::str::FromStr for Dn {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Dn> {
        Dn::parse(s)
    }
}

/// Schema-unaware value normalization: lowercase, trim, collapse runs of
/// internal whitespace. Syntax-aware normalization lives in the registries.
pub(crate) fn default_normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out
}

/// Split on `sep`, honoring backslash escapes.
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == sep {
            parts.push(&input[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    for ch in value.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let dn = Dn::parse("cn=Jack Daniels, ou=Engineering, o=Good Times Co.").unwrap();
        assert_eq!(dn.size(), 3);
        assert_eq!(dn.rdn().unwrap().attr(), "cn");
        assert_eq!(dn.rdn().unwrap().value(), "Jack Daniels");
        assert_eq!(
            dn.norm(),
            "cn=jack daniels,ou=engineering,o=good times co."
        );
    }

    #[test]
    fn test_empty_dn_is_root_dse() {
        let dn = Dn::parse("").unwrap();
        assert!(dn.is_empty());
        assert_eq!(dn, Dn::empty());
        assert!(dn.parent().is_none());
    }

    #[test]
    fn test_equality_ignores_case_and_spacing() {
        let a = Dn::parse("OU=Roles, O=MNN,C=WW,  ou=system").unwrap();
        let b = Dn::parse("ou=roles,o=mnn,c=ww,ou=system").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.user(), b.user());
    }

    #[test]
    fn test_escaped_separators() {
        let dn = Dn::parse(r"cn=Smith\, John,ou=people").unwrap();
        assert_eq!(dn.size(), 2);
        assert_eq!(dn.rdn().unwrap().value(), "Smith, John");
    }

    #[test]
    fn test_multi_valued_rdn_order_insensitive() {
        let a = Dn::parse("cn=J+sn=D,ou=x").unwrap();
        let b = Dn::parse("sn=D+cn=J,ou=x").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ancestry() {
        let suffix = Dn::parse("ou=system").unwrap();
        let mid = Dn::parse("o=MNN,c=WW,ou=system").unwrap();
        let leaf = Dn::parse("cn=X,o=MNN,c=WW,ou=system").unwrap();

        assert!(suffix.is_ancestor_of(&leaf));
        assert!(mid.is_ancestor_of(&leaf));
        assert!(!leaf.is_ancestor_of(&mid));
        assert!(!mid.is_ancestor_of(&mid));
        assert!(leaf.is_within(&mid));
        assert!(mid.is_within(&mid));
        assert!(Dn::empty().is_ancestor_of(&suffix));
    }

    #[test]
    fn test_rebase_into_referral_namespace() {
        let target = Dn::parse("cn=X,ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let referral = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let remote = Dn::parse("ou=Roles,dc=apache,dc=org").unwrap();

        let rebased = target.rebase(&referral, &remote).unwrap();
        assert_eq!(rebased.user(), "cn=X,ou=Roles,dc=apache,dc=org");
    }

    #[test]
    fn test_rebase_of_the_suffix_itself() {
        let referral = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let remote = Dn::parse("ou=Roles,dc=apache,dc=org").unwrap();
        let rebased = referral.rebase(&referral, &remote).unwrap();
        assert_eq!(rebased, remote);
    }

    #[test]
    fn test_rebase_outside_suffix_fails() {
        let target = Dn::parse("cn=X,ou=elsewhere").unwrap();
        let referral = Dn::parse("ou=Roles,ou=system").unwrap();
        assert!(target.rebase(&referral, &referral).is_err());
    }

    #[test]
    fn test_parent_child_round_trip() {
        let dn = Dn::parse("cn=X,ou=Roles,ou=system").unwrap();
        let parent = dn.parent().unwrap();
        assert_eq!(parent.user(), "ou=Roles,ou=system");
        let back = parent.child(dn.rdn().unwrap());
        assert_eq!(back, dn);
    }

    #[test]
    fn test_path_key_is_root_first() {
        let dn = Dn::parse("cn=X,ou=Roles,ou=system").unwrap();
        assert_eq!(dn.path_key(), vec!["ou=system", "ou=roles", "cn=x"]);
    }

    #[test]
    fn test_whitespace_collapse_in_norm() {
        let a = Dn::parse("cn=Good  Times   Co.").unwrap();
        let b = Dn::parse("cn=good times co.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rdn_without_equals_rejected() {
        assert!(Dn::parse("nonsense").is_err());
        assert!(Dn::parse("=value").is_err());
    }
}
