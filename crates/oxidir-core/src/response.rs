//! Search result transformation cursors.
//!
//! On the way back out of the pipeline the partition's entry cursor gets
//! wrapped twice: an [`EntryFilteringCursor`] applies the session's
//! visibility predicate and the requested attribute projection, and an
//! [`EntryToResponseCursor`] maps each entry into a protocol message.
//! Referral entries met during a search (without `ManageDsaIT`) become
//! continuation references; exhaustion produces exactly one
//! `SearchResultDone` carrying the request's message id.

use oxidir_error::{DirectoryError, Result};
use oxidir_partition::{Cursor, EntryCursor};
use oxidir_types::{
    Entry, ResultCode, SearchResponse, SearchResultDone, SearchResultEntry, SearchResultReference,
};

use crate::referral::{is_referral_entry, referral_urls};

pub type EntryPredicate = Box<dyn Fn(&Entry) -> bool + Send>;

/// Filters and projects the raw entry stream.
pub struct EntryFilteringCursor {
    inner: EntryCursor,
    predicate: EntryPredicate,
    attrs: Option<Vec<String>>,
    current: Option<Entry>,
}

impl EntryFilteringCursor {
    pub fn new(
        inner: EntryCursor,
        predicate: EntryPredicate,
        attrs: Option<Vec<String>>,
    ) -> EntryFilteringCursor {
        EntryFilteringCursor {
            inner,
            predicate,
            attrs,
            current: None,
        }
    }

    fn accept_current(&mut self) -> Result<bool> {
        let entry = self.inner.get()?;
        if (self.predicate)(entry) {
            self.current = Some(entry.project(self.attrs.as_deref()));
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl Cursor for EntryFilteringCursor {
    type Item = Entry;

    fn before_first(&mut self) -> Result<()> {
        self.current = None;
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.current = None;
        self.inner.after_last()
    }

    fn first(&mut self) -> Result<bool> {
        self.before_first()?;
        self.next()
    }

    fn last(&mut self) -> Result<bool> {
        self.after_last()?;
        self.previous()
    }

    fn next(&mut self) -> Result<bool> {
        while self.inner.next()? {
            if self.accept_current()? {
                return Ok(true);
            }
        }
        self.current = None;
        Ok(false)
    }

    fn previous(&mut self) -> Result<bool> {
        while self.inner.previous()? {
            if self.accept_current()? {
                return Ok(true);
            }
        }
        self.current = None;
        Ok(false)
    }

    fn available(&self) -> bool {
        self.current.is_some()
    }

    fn get(&self) -> Result<&Entry> {
        self.current
            .as_ref()
            .ok_or(DirectoryError::InvalidCursorPosition)
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.inner.close()
    }

    fn close_with(&mut self, cause: DirectoryError) -> Result<()> {
        self.current = None;
        self.inner.close_with(cause)
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Maps entries to `SearchResultEntry` / `SearchResultReference` messages
/// and reports the terminal `SearchResultDone` once the stream is drained.
pub struct EntryToResponseCursor {
    inner: EntryCursor,
    message_id: i32,
    manage_dsa_it: bool,
    current: Option<SearchResponse>,
    done: Option<SearchResultDone>,
}

impl EntryToResponseCursor {
    pub fn new(
        message_id: i32,
        inner: EntryCursor,
        manage_dsa_it: bool,
    ) -> EntryToResponseCursor {
        EntryToResponseCursor {
            inner,
            message_id,
            manage_dsa_it,
            current: None,
            done: None,
        }
    }

    /// The terminal response, present once `next` has returned false or
    /// the cursor was closed on a failure.
    pub fn search_done(&self) -> Option<&SearchResultDone> {
        self.done.as_ref()
    }

    fn response_for(&self, entry: Entry) -> Result<SearchResponse> {
        if !self.manage_dsa_it && is_referral_entry(&entry) {
            let urls = referral_urls(&entry)?
                .iter()
                .map(|u| u.to_string())
                .collect();
            return Ok(SearchResponse::Reference(SearchResultReference {
                message_id: self.message_id,
                urls,
            }));
        }
        Ok(SearchResponse::Entry(SearchResultEntry {
            message_id: self.message_id,
            entry,
        }))
    }
}

impl Cursor for EntryToResponseCursor {
    type Item = SearchResponse;

    fn before_first(&mut self) -> Result<()> {
        self.current = None;
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.current = None;
        self.inner.after_last()
    }

    fn first(&mut self) -> Result<bool> {
        self.before_first()?;
        self.next()
    }

    fn last(&mut self) -> Result<bool> {
        self.after_last()?;
        self.previous()
    }

    fn next(&mut self) -> Result<bool> {
        if self.inner.next()? {
            let entry = self.inner.get()?.clone();
            self.current = Some(self.response_for(entry)?);
            Ok(true)
        } else {
            self.current = None;
            if self.done.is_none() {
                self.done = Some(SearchResultDone {
                    message_id: self.message_id,
                    result_code: ResultCode::Success,
                });
            }
            Ok(false)
        }
    }

    fn previous(&mut self) -> Result<bool> {
        if self.inner.previous()? {
            let entry = self.inner.get()?.clone();
            self.current = Some(self.response_for(entry)?);
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    fn available(&self) -> bool {
        self.current.is_some()
    }

    fn get(&self) -> Result<&SearchResponse> {
        self.current
            .as_ref()
            .ok_or(DirectoryError::InvalidCursorPosition)
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        self.inner.close()
    }

    /// Closing on a failure records the terminal error as the done
    /// response instead of success.
    fn close_with(&mut self, cause: DirectoryError) -> Result<()> {
        self.current = None;
        self.done = Some(SearchResultDone {
            message_id: self.message_id,
            result_code: result_code_for(&cause),
        });
        self.inner.close_with(cause)
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Wire result code for a terminal failure.
pub fn result_code_for(error: &DirectoryError) -> ResultCode {
    match error {
        DirectoryError::NoSuchObject { .. } => ResultCode::NoSuchObject,
        DirectoryError::EntryAlreadyExists { .. } => ResultCode::EntryAlreadyExists,
        DirectoryError::NamingViolation { .. } => ResultCode::NamingViolation,
        DirectoryError::InvalidAttributeSyntax { .. } => ResultCode::InvalidAttributeSyntax,
        DirectoryError::InsufficientAccessRights { .. } => ResultCode::InsufficientAccessRights,
        DirectoryError::UnwillingToPerform { .. } => ResultCode::UnwillingToPerform,
        DirectoryError::AffectsMultipleDsas => ResultCode::AffectsMultipleDsas,
        DirectoryError::InvalidUrl { .. } => ResultCode::Referral,
        _ => ResultCode::Other,
    }
}
