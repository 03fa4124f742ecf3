//! Bidirectional cursors.
//!
//! A cursor is a stateful position over a typed element sequence. It
//! starts *before first*; `next`/`previous` move it and report whether a
//! new current element exists; `get` is defined exactly while
//! [`Cursor::available`] is true. Positioning calls (`before_first`,
//! `after_last`) move without reading. A cursor belongs to the thread
//! that opened it until closed; closing twice is a no-op.

use oxidir_error::{DirectoryError, Result};
use oxidir_types::Entry;
use tracing::debug;

pub trait Cursor {
    type Item;

    /// Position before the first element without reading.
    fn before_first(&mut self) -> Result<()>;

    /// Position after the last element without reading.
    fn after_last(&mut self) -> Result<()>;

    /// Position on the first element; true when one exists.
    fn first(&mut self) -> Result<bool>;

    /// Position on the last element; true when one exists.
    fn last(&mut self) -> Result<bool>;

    /// Advance; true exactly when a new current element exists.
    fn next(&mut self) -> Result<bool>;

    /// Retreat; true exactly when a new current element exists.
    fn previous(&mut self) -> Result<bool>;

    /// True exactly when a current element exists.
    fn available(&self) -> bool;

    /// The current element; defined only while `available` is true.
    fn get(&self) -> Result<&Self::Item>;

    /// Release resources. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Release resources, recording the cause of the closure.
    fn close_with(&mut self, cause: DirectoryError) -> Result<()>;

    fn is_closed(&self) -> bool;

    // The ancillary predicates are optional; sources that cannot answer
    // cheaply keep the default.

    fn is_first(&self) -> Result<bool> {
        Err(DirectoryError::UnsupportedOperation {
            operation: "is_first",
        })
    }

    fn is_last(&self) -> Result<bool> {
        Err(DirectoryError::UnsupportedOperation {
            operation: "is_last",
        })
    }

    fn is_before_first(&self) -> Result<bool> {
        Err(DirectoryError::UnsupportedOperation {
            operation: "is_before_first",
        })
    }

    fn is_after_last(&self) -> Result<bool> {
        Err(DirectoryError::UnsupportedOperation {
            operation: "is_after_last",
        })
    }
}

/// The cursor type partitions hand back from `search`.
pub type EntryCursor = Box<dyn Cursor<Item = Entry>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    On(usize),
    AfterLast,
}

/// A cursor over an in-memory snapshot.
#[derive(Debug)]
pub struct ListCursor<T> {
    items: Vec<T>,
    pos: Position,
    closed: bool,
}

impl<T> ListCursor<T> {
    pub fn new(items: Vec<T>) -> ListCursor<T> {
        ListCursor {
            items,
            pos: Position::BeforeFirst,
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(DirectoryError::CursorClosed)
        } else {
            Ok(())
        }
    }
}

impl<T> Cursor for ListCursor<T> {
    type Item = T;

    fn before_first(&mut self) -> Result<()> {
        self.check_open()?;
        self.pos = Position::BeforeFirst;
        Ok(())
    }

    fn after_last(&mut self) -> Result<()> {
        self.check_open()?;
        self.pos = Position::AfterLast;
        Ok(())
    }

    fn first(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.items.is_empty() {
            self.pos = Position::BeforeFirst;
            Ok(false)
        } else {
            self.pos = Position::On(0);
            Ok(true)
        }
    }

    fn last(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.items.is_empty() {
            self.pos = Position::AfterLast;
            Ok(false)
        } else {
            self.pos = Position::On(self.items.len() - 1);
            Ok(true)
        }
    }

    fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        self.pos = match self.pos {
            Position::BeforeFirst => {
                if self.items.is_empty() {
                    Position::AfterLast
                } else {
                    Position::On(0)
                }
            }
            Position::On(idx) if idx + 1 < self.items.len() => Position::On(idx + 1),
            Position::On(_) | Position::AfterLast => Position::AfterLast,
        };
        Ok(matches!(self.pos, Position::On(_)))
    }

    fn previous(&mut self) -> Result<bool> {
        self.check_open()?;
        self.pos = match self.pos {
            Position::AfterLast => {
                if self.items.is_empty() {
                    Position::BeforeFirst
                } else {
                    Position::On(self.items.len() - 1)
                }
            }
            Position::On(idx) if idx > 0 => Position::On(idx - 1),
            Position::On(_) | Position::BeforeFirst => Position::BeforeFirst,
        };
        Ok(matches!(self.pos, Position::On(_)))
    }

    fn available(&self) -> bool {
        !self.closed && matches!(self.pos, Position::On(_))
    }

    fn get(&self) -> Result<&T> {
        self.check_open()?;
        match self.pos {
            Position::On(idx) => Ok(&self.items[idx]),
            _ => Err(DirectoryError::InvalidCursorPosition),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn close_with(&mut self, cause: DirectoryError) -> Result<()> {
        debug!(%cause, "closing cursor on failure");
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_first(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.pos == Position::On(0) && !self.items.is_empty())
    }

    fn is_last(&self) -> Result<bool> {
        self.check_open()?;
        Ok(!self.items.is_empty() && self.pos == Position::On(self.items.len() - 1))
    }

    fn is_before_first(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.pos == Position::BeforeFirst)
    }

    fn is_after_last(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.pos == Position::AfterLast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> ListCursor<u32> {
        ListCursor::new(vec![10, 20, 30])
    }

    #[test]
    fn test_starts_before_first() {
        let c = cursor();
        assert!(c.is_before_first().unwrap());
        assert!(!c.available());
        assert!(matches!(
            c.get(),
            Err(DirectoryError::InvalidCursorPosition)
        ));
    }

    #[test]
    fn test_forward_walk() {
        let mut c = cursor();
        assert!(c.next().unwrap());
        assert_eq!(*c.get().unwrap(), 10);
        assert!(c.next().unwrap());
        assert!(c.next().unwrap());
        assert_eq!(*c.get().unwrap(), 30);
        assert!(!c.next().unwrap());
        assert!(!c.available());
        assert!(c.is_after_last().unwrap());
    }

    #[test]
    fn test_backward_walk_from_after_last() {
        let mut c = cursor();
        c.after_last().unwrap();
        assert!(c.previous().unwrap());
        assert_eq!(*c.get().unwrap(), 30);
        assert!(c.previous().unwrap());
        assert!(c.previous().unwrap());
        assert_eq!(*c.get().unwrap(), 10);
        assert!(!c.previous().unwrap());
        assert!(c.is_before_first().unwrap());
    }

    #[test]
    fn test_n_next_then_n_previous_lands_before_first() {
        let mut c = cursor();
        c.before_first().unwrap();
        for _ in 0..3 {
            assert!(c.next().unwrap());
        }
        for expected in [true, true, false] {
            assert_eq!(c.previous().unwrap(), expected);
        }
        assert!(c.is_before_first().unwrap());
        // The walk is repeatable from here.
        assert!(c.next().unwrap());
        assert_eq!(*c.get().unwrap(), 10);
    }

    #[test]
    fn test_first_and_last() {
        let mut c = cursor();
        assert!(c.first().unwrap());
        assert_eq!(*c.get().unwrap(), 10);
        assert!(c.is_first().unwrap());
        assert!(c.last().unwrap());
        assert_eq!(*c.get().unwrap(), 30);
        assert!(c.is_last().unwrap());
    }

    #[test]
    fn test_empty_cursor() {
        let mut c: ListCursor<u32> = ListCursor::new(Vec::new());
        assert!(!c.next().unwrap());
        assert!(!c.previous().unwrap());
        assert!(!c.first().unwrap());
        assert!(!c.last().unwrap());
        assert!(!c.available());
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let mut c = cursor();
        c.close().unwrap();
        assert!(c.is_closed());
        c.close().unwrap();
        assert!(matches!(c.next(), Err(DirectoryError::CursorClosed)));
        assert!(matches!(c.get(), Err(DirectoryError::CursorClosed)));
        assert!(!c.available());
    }
}
