//! LDAP URLs as they appear in `ref` attribute values.
//!
//! Only the DN component is honored by the pipeline. RFC 3296 restricts
//! referral URLs to the bare `scheme://host[:port]/dn` shape: an explicit
//! non-base scope, a filter, an attribute list, or extensions make the URL
//! invalid on ingest.

use std::fmt;

use oxidir_error::{DirectoryError, Result};

use crate::dn::Dn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Ldap,
    Ldaps,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Ldap => "ldap",
            Scheme::Ldaps => "ldaps",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdapUrl {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    dn: Dn,
}

impl LdapUrl {
    /// Parse and validate a referral URL.
    pub fn parse(input: &str) -> Result<LdapUrl> {
        let invalid = |detail: &str| DirectoryError::InvalidUrl {
            url: input.to_string(),
            detail: detail.to_string(),
        };

        let trimmed = input.trim();
        let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("ldaps://") {
            (Scheme::Ldaps, rest)
        } else if let Some(rest) = trimmed.strip_prefix("ldap://") {
            (Scheme::Ldap, rest)
        } else {
            return Err(invalid("not an LDAP URL"));
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) => {
                let port: u16 = p.parse().map_err(|_| invalid("invalid port"))?;
                (h.to_string(), Some(port))
            }
            None => (authority.to_string(), None),
        };

        // dn ? attributes ? scope ? filter ? extensions
        let mut fields = path.splitn(5, '?');
        let dn_part = fields.next().unwrap_or("");
        let attributes = fields.next().unwrap_or("");
        let scope = fields.next().unwrap_or("");
        let filter = fields.next().unwrap_or("");
        let extensions = fields.next().unwrap_or("");

        if !attributes.is_empty() {
            return Err(invalid("referral URLs must not carry an attribute list"));
        }
        if !scope.is_empty() && scope != "base" {
            return Err(invalid("referral URLs must use base scope"));
        }
        if !filter.is_empty() {
            return Err(invalid("referral URLs must not carry a filter"));
        }
        if !extensions.is_empty() {
            return Err(invalid("referral URLs must not carry extensions"));
        }

        let dn = Dn::parse(&percent_decode(dn_part)?)?;
        if dn.is_empty() {
            return Err(invalid("referral URLs must carry a non-empty DN"));
        }

        Ok(LdapUrl {
            scheme,
            host,
            port,
            dn,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// The same authority pointing at a different DN. This is how ancestor
    /// referrals rewrite URLs for the actual target.
    #[must_use]
    pub fn with_dn(&self, dn: Dn) -> LdapUrl {
        LdapUrl {
            scheme: self.scheme,
            host: self.host.clone(),
            port: self.port,
            dn,
        }
    }
}

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}", percent_encode(self.dn.user()))
    }
}

/// Encode the characters a DN component cannot carry raw in a URL.
fn percent_encode(dn: &str) -> String {
    let mut out = String::with_capacity(dn.len());
    for ch in dn.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '?' => out.push_str("%3F"),
            '%' => out.push_str("%25"),
            _ => out.push(ch),
        }
    }
    out
}

fn percent_decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = input.get(idx + 1..idx + 3).ok_or_else(|| {
                DirectoryError::InvalidUrl {
                    url: input.to_string(),
                    detail: "truncated percent escape".to_string(),
                }
            })?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| DirectoryError::InvalidUrl {
                url: input.to_string(),
                detail: format!("bad percent escape '%{hex}'"),
            })?;
            out.push(byte);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8(out).map_err(|_| DirectoryError::InvalidUrl {
        url: input.to_string(),
        detail: "DN component is not UTF-8".to_string(),
    })
}
