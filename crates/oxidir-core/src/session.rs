//! Core sessions.
//!
//! A session is the bind identity plus an environment map, alive for the
//! duration of a bind. Within one session the caller serializes its own
//! operations; the core imposes no ordering across sessions.

use std::collections::HashMap;

use oxidir_types::Dn;

pub const ADMIN_DN: &str = "uid=admin,ou=system";

#[derive(Clone, Debug)]
pub struct CoreSession {
    bind_dn: Dn,
    environment: HashMap<String, String>,
}

impl CoreSession {
    pub fn new(bind_dn: Dn) -> CoreSession {
        CoreSession {
            bind_dn,
            environment: HashMap::new(),
        }
    }

    pub fn anonymous() -> CoreSession {
        CoreSession::new(Dn::empty())
    }

    pub fn admin() -> CoreSession {
        CoreSession::new(Dn::parse(ADMIN_DN).expect("admin DN parses"))
    }

    pub fn bind_dn(&self) -> &Dn {
        &self.bind_dn
    }

    pub fn is_anonymous(&self) -> bool {
        self.bind_dn.is_empty()
    }

    pub fn is_admin(&self) -> bool {
        self.bind_dn.norm() == ADMIN_DN
    }

    pub fn set_env(&mut self, key: &str, value: &str) {
        self.environment.insert(key.to_string(), value.to_string());
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }
}
