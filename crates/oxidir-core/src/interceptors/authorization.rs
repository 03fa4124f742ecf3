//! Authorization hook.
//!
//! Access-control policy evaluation proper is out of scope; this stage
//! is the place it plugs in. The default rules protect the system
//! partition: only the admin identity mutates anything under
//! `ou=system`, and non-admin sessions cannot read the admin account.

use oxidir_error::{DirectoryError, Result};
use oxidir_types::{Dn, Registries};

use crate::chain::{Interceptor, Next};
use crate::context::{OpReply, Operation, OperationContext};
use crate::session::ADMIN_DN;

pub struct AuthorizationInterceptor {
    system_suffix: Dn,
    admin_dn: Dn,
}

impl AuthorizationInterceptor {
    pub fn new(registries: &Registries) -> AuthorizationInterceptor {
        let system_suffix = Dn::parse("ou=system")
            .expect("system suffix parses")
            .normalize(registries);
        let admin_dn = Dn::parse(ADMIN_DN)
            .expect("admin DN parses")
            .normalize(registries);
        AuthorizationInterceptor {
            system_suffix,
            admin_dn,
        }
    }
}

impl Interceptor for AuthorizationInterceptor {
    fn invoke(&self, ctx: &mut OperationContext, next: Next<'_>) -> Result<OpReply> {
        if !ctx.session.is_admin() {
            if ctx.operation.is_mutation() && ctx.dn.is_within(&self.system_suffix) {
                return Err(DirectoryError::InsufficientAccessRights {
                    dn: ctx.dn.to_string(),
                });
            }
            if matches!(
                ctx.operation,
                Operation::Lookup { .. } | Operation::Compare { .. }
            ) && ctx.dn == self.admin_dn
            {
                return Err(DirectoryError::InsufficientAccessRights {
                    dn: ctx.dn.to_string(),
                });
            }
        }
        next.invoke(ctx)
    }
}
