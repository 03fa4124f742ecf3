//! Conjunction cursor.
//!
//! Yields the elements present in every branch of an `And` filter. The
//! branch with the smallest candidate set drives as a real cursor; the
//! remaining branches run as evaluators against each driver element. Which branch drives is a join-ordering decision made by the
//! planner, not here.

use oxidir_error::{DirectoryError, Result};
use oxidir_types::Entry;

use crate::cursor::{Cursor, EntryCursor};
use crate::evaluator::Evaluator;

pub struct AndCursor {
    driver: EntryCursor,
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl AndCursor {
    pub fn new(driver: EntryCursor, evaluators: Vec<Box<dyn Evaluator>>) -> AndCursor {
        AndCursor { driver, evaluators }
    }

    fn accepted(&self, entry: &Entry) -> Result<bool> {
        for evaluator in &self.evaluators {
            if !evaluator.evaluate(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Cursor for AndCursor {
    type Item = Entry;

    fn before_first(&mut self) -> Result<()> {
        self.driver.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.driver.after_last()
    }

    fn first(&mut self) -> Result<bool> {
        self.driver.before_first()?;
        self.next()
    }

    fn last(&mut self) -> Result<bool> {
        self.driver.after_last()?;
        self.previous()
    }

    fn next(&mut self) -> Result<bool> {
        while self.driver.next()? {
            if self.accepted(self.driver.get()?)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn previous(&mut self) -> Result<bool> {
        while self.driver.previous()? {
            if self.accepted(self.driver.get()?)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn available(&self) -> bool {
        self.driver.available()
    }

    fn get(&self) -> Result<&Entry> {
        self.driver.get()
    }

    fn close(&mut self) -> Result<()> {
        self.driver.close()
    }

    fn close_with(&mut self, cause: DirectoryError) -> Result<()> {
        self.driver.close_with(cause)
    }

    fn is_closed(&self) -> bool {
        self.driver.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxidir_types::{Dn, Filter, Registries};

    use super::*;
    use crate::cursor::ListCursor;
    use crate::evaluator::FilterEvaluator;

    fn person(cn: &str, sn: Option<&str>) -> Entry {
        let mut e = Entry::new(Dn::parse(&format!("cn={cn},ou=x")).unwrap());
        e.put("objectClass", ["top", "person"]);
        e.put("cn", [cn]);
        if let Some(sn) = sn {
            e.put("sn", [sn]);
        }
        e
    }

    fn and_cursor() -> AndCursor {
        let reg = Arc::new(Registries::core_schema());
        let driver = ListCursor::new(vec![
            person("JOhnny WAlkeR", Some("WAlkeR")),
            person("Jane", None),
            person("JIM BEAN", Some("BEAN")),
        ]);
        let evaluators: Vec<Box<dyn Evaluator>> = vec![Box::new(FilterEvaluator::new(
            Filter::parse("(sn=*)").unwrap(),
            reg,
        ))];
        AndCursor::new(Box::new(driver), evaluators)
    }

    #[test]
    fn test_skips_rejected_driver_elements() {
        let mut c = and_cursor();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JOhnny WAlkeR"));
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JIM BEAN"));
        assert!(!c.next().unwrap());
    }

    #[test]
    fn test_reverse_traversal() {
        let mut c = and_cursor();
        c.after_last().unwrap();
        assert!(c.previous().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JIM BEAN"));
        assert!(c.previous().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JOhnny WAlkeR"));
        assert!(!c.previous().unwrap());
    }

    #[test]
    fn test_first_and_last_scan_for_matches() {
        let mut c = and_cursor();
        assert!(c.first().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JOhnny WAlkeR"));
        assert!(c.last().unwrap());
        assert_eq!(c.get().unwrap().first("cn"), Some("JIM BEAN"));
    }
}
