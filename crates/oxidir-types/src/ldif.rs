//! LDIF records, the fixture format of the test harnesses.
//!
//! Covers the add-record subset: a `dn:` line followed by attribute
//! lines, records separated by blank lines. Continuation lines (leading
//! space) and `#` comments are handled; base64 (`::`) and change records
//! are not.

use oxidir_error::{DirectoryError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdifRecord {
    pub dn: String,
    pub attributes: Vec<(String, String)>,
}

/// Parse LDIF text into records.
pub fn parse_ldif(text: &str) -> Result<Vec<LdifRecord>> {
    let mut records = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    // Unfold continuations and strip comments first.
    for raw in text.lines() {
        if raw.starts_with('#') {
            continue;
        }
        if let Some(cont) = raw.strip_prefix(' ') {
            match lines.last_mut() {
                Some(last) if !last.is_empty() => last.push_str(cont),
                _ => {
                    return Err(DirectoryError::naming_violation(
                        "LDIF continuation line with nothing to continue",
                    ))
                }
            }
        } else {
            lines.push(raw.to_string());
        }
    }

    let mut current: Vec<&str> = Vec::new();
    for line in lines.iter().map(String::as_str).chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(build_record(&current)?);
                current.clear();
            }
        } else {
            current.push(line);
        }
    }

    Ok(records)
}

fn build_record(lines: &[&str]) -> Result<LdifRecord> {
    let first = lines[0];
    let dn = first
        .strip_prefix("dn:")
        .map(str::trim)
        .ok_or_else(|| {
            DirectoryError::naming_violation(format!("LDIF record must start with 'dn:': '{first}'"))
        })?;

    let mut attributes = Vec::new();
    for line in &lines[1..] {
        if line.contains("::") {
            return Err(DirectoryError::naming_violation(format!(
                "base64 LDIF values are not supported: '{line}'"
            )));
        }
        let (id, value) = line.split_once(':').ok_or_else(|| {
            DirectoryError::naming_violation(format!("malformed LDIF attribute line: '{line}'"))
        })?;
        attributes.push((id.trim().to_string(), value.trim().to_string()));
    }

    Ok(LdifRecord {
        dn: dn.to_string(),
        attributes,
    })
}
