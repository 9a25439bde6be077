//! Node set expansion
//!
//! Expands compact host expressions such as `rcc[10-20,25]` or
//! `qh2-rcc[1-3].example.org` into explicit host names. A bare name with no
//! brackets expands to itself. Only one bracket group is supported.

use std::collections::HashSet;
use thiserror::Error;

/// Largest number of hosts one expression may name, counted before
/// duplicates collapse
pub const MAX_HOSTS: u64 = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeSetError {
    #[error("empty node expression")]
    Empty,

    #[error("multiple range groups not supported: {0}")]
    MultipleGroups(String),

    #[error("unbalanced brackets in node expression: {0}")]
    Unbalanced(String),

    #[error("invalid range entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: &'static str },

    #[error("node expression {expr} expands to more than {limit} hosts")]
    TooManyHosts { expr: String, limit: u64 },
}

/// Expand a node expression into the set of host names it denotes
pub fn expand(expr: &str) -> Result<HashSet<String>, NodeSetError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(NodeSetError::Empty);
    }

    let Some(open) = expr.find('[') else {
        if expr.contains(']') {
            return Err(NodeSetError::Unbalanced(expr.to_string()));
        }
        return Ok(HashSet::from([expr.to_string()]));
    };

    let close = expr[open..]
        .find(']')
        .map(|offset| open + offset)
        .ok_or_else(|| NodeSetError::Unbalanced(expr.to_string()))?;

    let prefix = &expr[..open];
    let body = &expr[open + 1..close];
    let suffix = &expr[close + 1..];

    if body.contains('[') || suffix.contains('[') {
        return Err(NodeSetError::MultipleGroups(expr.to_string()));
    }
    if prefix.contains(']') || suffix.contains(']') {
        return Err(NodeSetError::Unbalanced(expr.to_string()));
    }

    let ranges = body
        .split(',')
        .map(parse_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let total = ranges
        .iter()
        .map(|(start, end)| (end - start).saturating_add(1))
        .fold(0u64, u64::saturating_add);
    if total > MAX_HOSTS {
        return Err(NodeSetError::TooManyHosts {
            expr: expr.to_string(),
            limit: MAX_HOSTS,
        });
    }

    let mut hosts = HashSet::new();
    for (start, end) in ranges {
        for n in start..=end {
            hosts.insert(format!("{prefix}{n}{suffix}"));
        }
    }

    Ok(hosts)
}

/// Parse a single `N` or `START-END` entry into an inclusive range
fn parse_entry(entry: &str) -> Result<(u64, u64), NodeSetError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Err(invalid(entry, "empty entry"));
    }

    match trimmed.split_once('-') {
        None => {
            let n = parse_bound(trimmed, entry)?;
            Ok((n, n))
        }
        Some((start, end)) => {
            let (start, end) = (start.trim(), end.trim());
            if start.is_empty() || end.is_empty() {
                return Err(invalid(entry, "open ended ranges are not supported"));
            }

            let start = parse_bound(start, entry)?;
            let end = parse_bound(end, entry)?;
            if start > end {
                return Err(invalid(entry, "range start exceeds range end"));
            }

            Ok((start, end))
        }
    }
}

fn parse_bound(bound: &str, entry: &str) -> Result<u64, NodeSetError> {
    bound
        .parse()
        .map_err(|_| invalid(entry, "not an unsigned integer"))
}

fn invalid(entry: &str, reason: &'static str) -> NodeSetError {
    NodeSetError::InvalidEntry {
        entry: entry.trim().to_string(),
        reason,
    }
}
