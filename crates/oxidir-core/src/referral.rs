//! The referral manager.
//!
//! Keeps the set of DNs currently known to be referrals, keyed for the
//! two questions the pipeline asks on every request: is this DN itself a
//! referral, and what is its closest referral ancestor? A trie over
//! normalized DN components answers both in O(depth).
//!
//! One `RwLock` guards the whole trie: writers serialize behind it and
//! readers always observe a consistent snapshot, including across the
//! remove-then-insert pair a modify or rename performs. The set is only
//! ever updated after the underlying partition operation has committed.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};

use oxidir_error::{DirectoryError, Result};
use oxidir_partition::{Cursor as _, Partition};
use oxidir_types::{Dn, Entry, Filter, LdapUrl, SearchScope, Value};

/// Answer to the ancestor-referral query for a target DN.
#[derive(Clone, Debug)]
pub enum ReferralHit {
    /// Neither the target nor any ancestor is a referral.
    None,
    /// The target itself is a referral.
    Exact { dn: Dn, urls: Vec<LdapUrl> },
    /// The closest proper ancestor that is a referral.
    Ancestor { dn: Dn, urls: Vec<LdapUrl> },
}

#[derive(Default)]
struct Node {
    referral: Option<(Dn, Vec<LdapUrl>)>,
    children: HashMap<String, Node>,
}

#[derive(Default)]
pub struct ReferralManager {
    root: RwLock<Node>,
}

impl ReferralManager {
    pub fn new() -> ReferralManager {
        ReferralManager::default()
    }

    /// Walk the trie toward `dn`, reporting an exact hit or the deepest
    /// referral strictly above it.
    pub fn lookup(&self, dn: &Dn) -> ReferralHit {
        let root = self.root.read();
        let components = dn.path_key();
        let mut node = &*root;
        let mut ancestor: Option<(Dn, Vec<LdapUrl>)> = None;

        for (depth, component) in components.iter().enumerate() {
            let Some(child) = node.children.get(component) else {
                break;
            };
            node = child;
            if let Some((ref_dn, urls)) = &node.referral {
                if depth + 1 == components.len() {
                    return ReferralHit::Exact {
                        dn: ref_dn.clone(),
                        urls: urls.clone(),
                    };
                }
                ancestor = Some((ref_dn.clone(), urls.clone()));
            }
        }

        match ancestor {
            Some((dn, urls)) => ReferralHit::Ancestor { dn, urls },
            None => ReferralHit::None,
        }
    }

    pub fn is_referral(&self, dn: &Dn) -> bool {
        matches!(self.lookup(dn), ReferralHit::Exact { .. })
    }

    pub fn has_ancestor_referral(&self, dn: &Dn) -> bool {
        matches!(self.lookup(dn), ReferralHit::Ancestor { .. })
    }

    /// Install a referral entry's DN and parsed URLs.
    pub fn add_referral(&self, entry: &Entry) -> Result<()> {
        let urls = referral_urls(entry)?;
        let dn = entry.dn().clone();
        let mut root = self.root.write();
        Self::insert(&mut root, &dn, urls);
        debug!(%dn, "installed referral");
        Ok(())
    }

    pub fn remove_referral(&self, dn: &Dn) {
        let mut root = self.root.write();
        Self::clear(&mut root, dn);
        debug!(%dn, "removed referral");
    }

    /// Atomically drop `old_dn` from the set and re-install `new_entry`
    /// if it is (still) a referral. Readers never observe the state
    /// between the two steps. Covers modify (same DN) and rename/move
    /// (relocated DN).
    pub fn reconcile(&self, old_dn: &Dn, new_entry: Option<&Entry>) -> Result<()> {
        let mut root = self.root.write();
        Self::clear(&mut root, old_dn);
        if let Some(entry) = new_entry {
            if is_referral_entry(entry) {
                let urls = referral_urls(entry)?;
                Self::insert(&mut root, entry.dn(), urls);
            }
        }
        Ok(())
    }

    /// Seed the set from a freshly registered partition: subtree search
    /// for `(objectClass=referral)` under its suffix.
    pub fn init_partition(&self, partition: &dyn Partition) -> Result<usize> {
        let filter = Filter::equality("objectClass", "referral");
        let mut cursor =
            match partition.search(partition.suffix(), SearchScope::Subtree, &filter) {
                Ok(cursor) => cursor,
                // An empty partition has no suffix entry yet, and no referrals.
                Err(DirectoryError::NoSuchObject { .. }) => return Ok(0),
                Err(e) => return Err(e),
            };

        let mut installed = 0;
        while cursor.next()? {
            let entry = cursor.get()?;
            match self.add_referral(entry) {
                Ok(()) => installed += 1,
                Err(e) => warn!(dn = %entry.dn(), error = %e, "skipping unusable referral"),
            }
        }
        cursor.close()?;
        debug!(
            suffix = %partition.suffix(),
            installed,
            "seeded referrals from partition"
        );
        Ok(installed)
    }

    fn insert(root: &mut Node, dn: &Dn, urls: Vec<LdapUrl>) {
        let mut node = root;
        for component in dn.path_key() {
            node = node.children.entry(component).or_default();
        }
        node.referral = Some((dn.clone(), urls));
    }

    fn clear(root: &mut Node, dn: &Dn) {
        let mut node = root;
        for component in dn.path_key() {
            match node.children.get_mut(&component) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.referral = None;
    }
}

/// True when the entry's object classes include `referral`.
pub fn is_referral_entry(entry: &Entry) -> bool {
    entry.has_object_class("referral")
}

/// The parseable LDAP URLs of a referral entry's `ref` attribute.
///
/// Unparseable and invalid URLs are logged and skipped; the entry is
/// still a referral as long as it carries the attribute. A referral
/// entry without `ref` is a schema violation surfaced late.
pub fn referral_urls(entry: &Entry) -> Result<Vec<LdapUrl>> {
    let Some(ref_attr) = entry.get("ref") else {
        return Err(DirectoryError::unwilling(format!(
            "referral entry '{}' carries no 'ref' attribute",
            entry.dn()
        )));
    };

    let mut urls = Vec::new();
    for value in ref_attr.values().iter().filter_map(Value::as_text) {
        match LdapUrl::parse(value) {
            Ok(url) => urls.push(url),
            Err(e) => warn!(dn = %entry.dn(), error = %e, "ignoring invalid ref value"),
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referral_entry(dn: &str, refs: &[&str]) -> Entry {
        let dn = Dn::parse(dn).unwrap();
        let mut e = Entry::new(dn.clone());
        e.put("objectClass", ["top", "extensibleObject", "referral"]);
        e.put("ou", [dn.rdn().unwrap().value().to_string()]);
        e.put("ref", refs.iter().copied());
        e
    }

    fn manager_with_roles() -> ReferralManager {
        let m = ReferralManager::new();
        m.add_referral(&referral_entry(
            "ou=Roles,o=MNN,c=WW,ou=system",
            &["ldap://hostd/ou=Roles,dc=apache,dc=org"],
        ))
        .unwrap();
        m
    }

    #[test]
    fn test_exact_hit() {
        let m = manager_with_roles();
        let dn = Dn::parse("ou=roles,o=mnn,c=ww,ou=system").unwrap();
        let ReferralHit::Exact { urls, .. } = m.lookup(&dn) else {
            panic!("expected exact hit");
        };
        assert_eq!(urls.len(), 1);
        assert!(m.is_referral(&dn));
    }

    #[test]
    fn test_ancestor_hit() {
        let m = manager_with_roles();
        let dn = Dn::parse("cn=X,ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let ReferralHit::Ancestor { dn: ref_dn, .. } = m.lookup(&dn) else {
            panic!("expected ancestor hit");
        };
        assert_eq!(ref_dn.norm(), "ou=roles,o=mnn,c=ww,ou=system");
        assert!(m.has_ancestor_referral(&dn));
        assert!(!m.is_referral(&dn));
    }

    #[test]
    fn test_closest_ancestor_wins() {
        let m = manager_with_roles();
        m.add_referral(&referral_entry(
            "ou=inner,ou=Roles,o=MNN,c=WW,ou=system",
            &["ldap://hoste/ou=Inner,dc=apache,dc=org"],
        ))
        .unwrap();

        let dn = Dn::parse("cn=X,ou=inner,ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let ReferralHit::Ancestor { dn: ref_dn, .. } = m.lookup(&dn) else {
            panic!("expected ancestor hit");
        };
        assert_eq!(ref_dn.norm(), "ou=inner,ou=roles,o=mnn,c=ww,ou=system");
    }

    #[test]
    fn test_unrelated_dn_misses() {
        let m = manager_with_roles();
        let dn = Dn::parse("cn=Alex Karasulu,o=MNN,c=WW,ou=system").unwrap();
        assert!(matches!(m.lookup(&dn), ReferralHit::None));
    }

    #[test]
    fn test_remove_referral() {
        let m = manager_with_roles();
        let dn = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        m.remove_referral(&dn);
        assert!(matches!(m.lookup(&dn), ReferralHit::None));
        let below = Dn::parse("cn=X,ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        assert!(matches!(m.lookup(&below), ReferralHit::None));
    }

    #[test]
    fn test_reconcile_handles_rename() {
        let m = manager_with_roles();
        let old_dn = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let renamed = referral_entry(
            "ou=Groups,o=MNN,c=WW,ou=system",
            &["ldap://hostd/ou=Roles,dc=apache,dc=org"],
        );
        m.reconcile(&old_dn, Some(&renamed)).unwrap();

        assert!(!m.is_referral(&old_dn));
        assert!(m.is_referral(renamed.dn()));
    }

    #[test]
    fn test_reconcile_drops_ex_referral() {
        let m = manager_with_roles();
        let dn = Dn::parse("ou=Roles,o=MNN,c=WW,ou=system").unwrap();
        let mut plain = Entry::new(dn.clone());
        plain.put("objectClass", ["top", "organizationalUnit"]);
        plain.put("ou", ["Roles"]);
        m.reconcile(&dn, Some(&plain)).unwrap();
        assert!(!m.is_referral(&dn));
    }

    #[test]
    fn test_invalid_urls_are_skipped_not_fatal() {
        let entry = referral_entry(
            "ou=People,o=MNN,c=WW,ou=system",
            &[
                "ldap://hostb/OU=People,DC=example,DC=com",
                "not a url at all",
                "ldap://hostc/OU=People,O=MNN,C=WW",
            ],
        );
        let urls = referral_urls(&entry).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_missing_ref_attribute_is_unwilling() {
        let mut e = Entry::new(Dn::parse("ou=bad,ou=system").unwrap());
        e.put("objectClass", ["top", "referral"]);
        assert!(matches!(
            referral_urls(&e),
            Err(DirectoryError::UnwillingToPerform { .. })
        ));
    }
}
