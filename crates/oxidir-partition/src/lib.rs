//! Storage partitions and cursors for the oxidir directory server.
//!
//! A [`Partition`] owns a contiguous subtree rooted at its suffix DN and
//! serves the primitive operations the pipeline's terminal stage routes
//! to it. [`AvlPartition`] is the in-memory implementation; search runs
//! over per-attribute value indexes where they can answer and falls back
//! to evaluator scans where they cannot.

pub mod and_cursor;
pub mod avl;
pub mod cursor;
pub mod evaluator;
pub mod index;
pub mod traits;

pub use and_cursor::AndCursor;
pub use avl::AvlPartition;
pub use cursor::{Cursor, EntryCursor, ListCursor};
pub use evaluator::{Evaluator, FilterEvaluator};
pub use index::{AttributeIndex, EntryId};
pub use traits::Partition;
