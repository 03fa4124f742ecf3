//! The seam between the operation pipeline and storage.
//!
//! A partition owns a contiguous subtree rooted at its suffix. Every DN
//! crossing this boundary is already normalized; the pipeline's
//! normalization stage guarantees it. Partition-local concurrency is the
//! partition's own concern.

use oxidir_error::Result;
use oxidir_types::{Dn, Entry, Filter, Modification, Rdn, SearchScope};

use crate::cursor::EntryCursor;

pub trait Partition: Send + Sync {
    fn id(&self) -> &str;

    /// The normalized suffix DN this partition is rooted at.
    fn suffix(&self) -> &Dn;

    fn add(&self, entry: Entry) -> Result<()>;

    /// Delete a leaf entry, returning it.
    fn delete(&self, dn: &Dn) -> Result<Entry>;

    /// Apply modifications, returning the entry as stored afterwards.
    fn modify(&self, dn: &Dn, mods: &[Modification]) -> Result<Entry>;

    fn lookup(&self, dn: &Dn, attrs: Option<&[String]>) -> Result<Entry>;

    fn has_entry(&self, dn: &Dn) -> Result<bool>;

    fn search(&self, base: &Dn, scope: SearchScope, filter: &Filter) -> Result<EntryCursor>;

    /// Replace the leaf RDN. Returns the stored entry and its new DN.
    fn rename(&self, dn: &Dn, new_rdn: &Rdn, delete_old_rdn: bool) -> Result<(Entry, Dn)>;

    /// Re-parent a subtree within this partition.
    fn move_entry(&self, dn: &Dn, new_parent: &Dn) -> Result<(Entry, Dn)>;

    fn move_and_rename(
        &self,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
    ) -> Result<(Entry, Dn)>;
}
