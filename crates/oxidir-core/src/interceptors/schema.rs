//! Schema checks.
//!
//! Validates what the store relies on: every entry carries `objectClass`,
//! values conform to their syntax (no empty strings), mandatory
//! attributes of the declared object classes are present, and the RDN
//! assertions appear among the entry's attributes.

use std::sync::Arc;

use oxidir_error::{DirectoryError, Result};
use oxidir_types::{Entry, Modification, Registries, Value};

use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};

pub struct SchemaInterceptor {
    registries: Arc<Registries>,
}

impl SchemaInterceptor {
    pub fn new(registries: Arc<Registries>) -> SchemaInterceptor {
        SchemaInterceptor { registries }
    }

    fn check_values(entry: &Entry) -> Result<()> {
        for attr in entry.attributes() {
            for value in attr.values() {
                if value.as_text().is_some_and(str::is_empty) {
                    return Err(DirectoryError::InvalidAttributeSyntax {
                        attribute: attr.id().to_string(),
                        detail: "empty value".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_object_classes(&self, entry: &Entry) -> Result<()> {
        let classes = entry.object_classes();
        if classes.is_empty() {
            return Err(DirectoryError::naming_violation(format!(
                "entry '{}' has no objectClass",
                entry.dn()
            )));
        }

        for name in classes {
            let Some(class) = self.registries.object_class(name) else {
                continue;
            };
            for must in class.must() {
                if entry.get(must).is_none() {
                    // A referral without its ref attribute is the late
                    // invariant violation, not a naming problem.
                    if class.name().eq_ignore_ascii_case("referral") {
                        return Err(DirectoryError::unwilling(format!(
                            "referral entry '{}' must carry a 'ref' attribute",
                            entry.dn()
                        )));
                    }
                    return Err(DirectoryError::naming_violation(format!(
                        "entry '{}' is missing '{must}' required by object class '{name}'",
                        entry.dn()
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_rdn(&self, ctx: &OperationContext, entry: &Entry) -> Result<()> {
        let Some(rdn) = ctx.dn.rdn() else {
            return Ok(());
        };
        for ava in rdn.avas() {
            let present = entry
                .get(ava.attr())
                .is_some_and(|a| a.contains(&Value::text(ava.value())));
            if !present {
                return Err(DirectoryError::naming_violation(format!(
                    "RDN assertion '{}={}' does not appear in the entry",
                    ava.attr(),
                    ava.value()
                )));
            }
        }
        Ok(())
    }

    fn check_mods(mods: &[Modification]) -> Result<()> {
        for m in mods {
            if m.attribute().trim().is_empty() {
                return Err(DirectoryError::naming_violation(
                    "modification with empty attribute id",
                ));
            }
            match m {
                Modification::Add { attribute, values }
                | Modification::Replace { attribute, values } => {
                    for value in values {
                        if value.as_text().is_some_and(str::is_empty) {
                            return Err(DirectoryError::InvalidAttributeSyntax {
                                attribute: attribute.clone(),
                                detail: "empty value".to_string(),
                            });
                        }
                    }
                    if attribute.eq_ignore_ascii_case("objectclass")
                        && matches!(m, Modification::Replace { .. })
                        && values.is_empty()
                    {
                        return Err(DirectoryError::naming_violation(
                            "objectClass cannot be removed",
                        ));
                    }
                }
                Modification::Remove { attribute, values } => {
                    if attribute.eq_ignore_ascii_case("objectclass") && values.is_empty() {
                        return Err(DirectoryError::naming_violation(
                            "objectClass cannot be removed",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Interceptor for SchemaInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        match &ctx.operation {
            Operation::Add { entry } => {
                Self::check_values(entry)?;
                self.check_object_classes(entry)?;
                self.check_rdn(ctx, entry)?;
            }
            Operation::Modify { mods } => {
                Self::check_mods(mods)?;
            }
            _ => {}
        }
        next.invoke(ctx)
    }
}
