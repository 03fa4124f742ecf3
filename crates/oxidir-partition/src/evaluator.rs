//! Filter evaluators.
//!
//! An evaluator answers "does this entry satisfy this filter node"
//! without touching any index. The search planner pairs a driver cursor
//! (cheapest candidate set) with evaluators for the remaining branches.

use std::sync::Arc;

use oxidir_error::Result;
use oxidir_types::{Entry, Filter, Registries, Value};

pub trait Evaluator: Send + Sync {
    fn evaluate(&self, entry: &Entry) -> Result<bool>;
}

pub struct FilterEvaluator {
    filter: Filter,
    registries: Arc<Registries>,
}

impl FilterEvaluator {
    pub fn new(filter: Filter, registries: Arc<Registries>) -> FilterEvaluator {
        FilterEvaluator { filter, registries }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    fn eval_node(&self, filter: &Filter, entry: &Entry) -> Result<bool> {
        match filter {
            Filter::Present { attr } => Ok(entry.get(attr).is_some()),
            Filter::Equality { attr, value } => {
                let wanted = self.registries.normalize_value(attr, value);
                Ok(entry.get(attr).is_some_and(|a| {
                    a.values()
                        .iter()
                        .filter_map(Value::as_text)
                        .any(|v| self.registries.normalize_value(attr, v) == wanted)
                }))
            }
            Filter::Substring {
                attr,
                initial,
                any,
                final_,
            } => {
                let Some(a) = entry.get(attr) else {
                    return Ok(false);
                };
                Ok(a.values().iter().filter_map(Value::as_text).any(|v| {
                    let haystack = self.registries.normalize_value(attr, v);
                    substring_match(
                        &haystack,
                        initial
                            .as_deref()
                            .map(|p| self.registries.normalize_value(attr, p)),
                        any.iter()
                            .map(|p| self.registries.normalize_value(attr, p)),
                        final_
                            .as_deref()
                            .map(|p| self.registries.normalize_value(attr, p)),
                    )
                }))
            }
            Filter::And(children) => {
                for c in children {
                    if !self.eval_node(c, entry)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(children) => {
                for c in children {
                    if self.eval_node(c, entry)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(child) => Ok(!self.eval_node(child, entry)?),
        }
    }
}

impl Evaluator for FilterEvaluator {
    fn evaluate(&self, entry: &Entry) -> Result<bool> {
        self.eval_node(&self.filter, entry)
    }
}

fn substring_match(
    haystack: &str,
    initial: Option<String>,
    any: impl Iterator<Item = String>,
    final_: Option<String>,
) -> bool {
    let mut rest = haystack;

    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }

    let suffix_len = final_.as_ref().map_or(0, String::len);

    for piece in any {
        match rest.find(piece.as_str()) {
            Some(idx) if rest.len() - (idx + piece.len()) >= suffix_len => {
                rest = &rest[idx + piece.len()..];
            }
            _ => return false,
        }
    }

    match final_ {
        Some(suffix) => rest.ends_with(suffix.as_str()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidir_types::Dn;

    fn johnny() -> Entry {
        let mut e = Entry::new(Dn::parse("cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.").unwrap());
        e.put("objectClass", ["top", "person"]);
        e.put("cn", ["JOhnny WAlkeR"]);
        e.put("sn", ["WAlkeR"]);
        e
    }

    fn eval(text: &str, entry: &Entry) -> bool {
        let reg = Arc::new(Registries::core_schema());
        FilterEvaluator::new(Filter::parse(text).unwrap(), reg)
            .evaluate(entry)
            .unwrap()
    }

    #[test]
    fn test_presence() {
        let e = johnny();
        assert!(eval("(sn=*)", &e));
        assert!(!eval("(uid=*)", &e));
    }

    #[test]
    fn test_equality_under_matching_rule() {
        let e = johnny();
        assert!(eval("(cn=johnny walker)", &e));
        assert!(eval("(CN=JOHNNY  WALKER)", &e));
        assert!(!eval("(cn=jim bean)", &e));
    }

    #[test]
    fn test_substring_shapes() {
        let e = johnny();
        assert!(eval("(cn=J*)", &e));
        assert!(eval("(cn=*walker)", &e));
        assert!(eval("(cn=j*nny*ker)", &e));
        assert!(!eval("(cn=K*)", &e));
        assert!(!eval("(cn=j*zzz*)", &e));
    }

    #[test]
    fn test_connectives() {
        let e = johnny();
        assert!(eval("(&(cn=J*)(sn=*))", &e));
        assert!(!eval("(&(cn=J*)(uid=*))", &e));
        assert!(eval("(|(uid=*)(sn=walker))", &e));
        assert!(eval("(!(cn=jim bean))", &e));
    }

    #[test]
    fn test_overlapping_any_and_final() {
        // The final piece must not consume the bytes an any-piece matched.
        let mut e = Entry::new(Dn::parse("cn=x").unwrap());
        e.put("cn", ["aba"]);
        assert!(eval("(cn=*ab*a)", &e));
        assert!(!eval("(cn=*aba*ba)", &e));
    }
}
