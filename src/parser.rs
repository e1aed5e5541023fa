//! Policy statement parser: statement text → positional tuple.
//!
//! The policy language is a small, loosely specified DSL:
//!
//! ```text
//! allow <subject> to <verb> <resource> in <location> [where <condition>]
//! ```
//!
//! Parsing is left-to-right partitioning on fixed separators, not a grammar.
//! It never fails: malformed input yields a tuple with empty fields, which the
//! caller reports (see [`StatementTuple::is_malformed`]). Statements beginning
//! with `endorse`, `admit` or `define` are structurally different and are
//! returned verbatim as [`Parsed::Special`].
//!
//! The verb is whatever the first token of the action clause is. Brace-delimited
//! permission lists (`{SUBNET_READ, SUBNET_ATTACH}`) therefore split into a
//! partial verb and resource; filters downstream rely on this split as-is.

use serde::{Deserialize, Serialize};

/// Keywords that mark a statement as special (not a permission grant).
pub const SPECIAL_PREFIXES: [&str; 3] = ["endorse", "admit", "define"];

/// Location forms that are already absolute and never rewritten.
const ABSOLUTE_LOCATIONS: [&str; 2] = ["compartment id", "tenancy"];

/// A decomposed grant statement, before lineage is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementTuple {
    pub subject: String,
    pub verb: String,
    pub resource: String,
    pub location: String,
    pub condition: String,
}

impl StatementTuple {
    /// An empty subject means the text did not follow `allow ... to ...`.
    pub fn is_malformed(&self) -> bool {
        self.subject.is_empty()
    }
}

/// Result of parsing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A grant decomposed into subject/verb/resource/location/condition.
    Statement(StatementTuple),
    /// An `endorse`/`admit`/`define` statement, case-normalized but otherwise verbatim.
    Special(String),
}

/// Case-normalize a statement. All matching happens on the normalized text.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether normalized text is a special statement.
pub fn is_special(normalized: &str) -> bool {
    SPECIAL_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}

/// Parse one statement written in a compartment with the given ancestry path.
///
/// `compartment_path` is empty for the tenancy root. It is used to qualify
/// relative compartment names in the location clause.
pub fn parse(raw: &str, compartment_path: &str) -> Parsed {
    let normalized = normalize(raw);
    if is_special(&normalized) {
        return Parsed::Special(normalized);
    }

    let (head, condition) = partition(&normalized, " where ");
    let (_, grant) = partition(head, "allow ");
    let (subject, action) = partition(grant, " to ");
    let (verb_resource, raw_location) = partition(action, " in ");
    let (verb, resource) = partition(verb_resource, " ");

    Parsed::Statement(StatementTuple {
        subject: subject.to_string(),
        verb: verb.to_string(),
        resource: resource.to_string(),
        location: normalize_location(raw_location, compartment_path),
        condition: condition.to_string(),
    })
}

/// Qualify a relative compartment location with the statement's home path.
///
/// `"compartment id ..."` and `"tenancy"` forms are returned unchanged, as is
/// everything at the root (`compartment_path == ""`). A relative name that
/// already carries the home path is not prefixed twice, so the rewrite is
/// idempotent. The cost: a child literally named after its parent's path,
/// like `compartment finance:sub` written inside `Finance`, stays
/// `finance:sub` rather than becoming `finance:finance:sub`.
pub fn normalize_location(raw_location: &str, compartment_path: &str) -> String {
    if raw_location.is_empty()
        || compartment_path.is_empty()
        || ABSOLUTE_LOCATIONS
            .iter()
            .any(|form| raw_location.contains(form))
    {
        return raw_location.to_string();
    }

    let path = compartment_path.to_lowercase();
    let relative = raw_location
        .split_once("compartment ")
        .map(|(_, rest)| rest)
        .unwrap_or(raw_location)
        .trim();

    let qualified_prefix = format!("{path}:");
    if relative.starts_with(&qualified_prefix) {
        format!("compartment {relative}")
    } else {
        format!("compartment {path}:{relative}")
    }
}

/// Split on the first occurrence of `sep`. Without a match the whole input is
/// the head and the tail is empty.
fn partition<'a>(input: &'a str, sep: &str) -> (&'a str, &'a str) {
    input.split_once(sep).unwrap_or((input, ""))
}
