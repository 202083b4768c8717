//! Replication position tokens
//!
//! A `TransactionSet` names a set of applied transactions per source:
//! `source:1-5:8,other:3`. Tokens are normalized on construction:
//! - Intervals per source are sorted and disjoint
//! - Adjacent and overlapping intervals are coalesced
//! - Sources are kept in lexicographic order
//!
//! Normalization makes the subset test a plain interval-cover walk and
//! `Display` output canonical, so equal sets print identically.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::errors::{GateError, GateResult};

/// A normalized set of applied transactions, grouped by source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionSet {
    /// Source id -> sorted, disjoint, inclusive intervals.
    sources: BTreeMap<String, Vec<(u64, u64)>>,
}

impl TransactionSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a token like `src:1-5:8,other:3`. An empty or blank token is
    /// the empty set.
    pub fn parse(input: &str) -> GateResult<Self> {
        let mut set = TransactionSet::new();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(set);
        }
        for part in trimmed.split(',') {
            let part = part.trim();
            let mut pieces = part.split(':');
            let source = pieces.next().unwrap_or_default();
            if source.is_empty() {
                return Err(GateError::Malformed(format!("empty source in '{}'", part)));
            }
            let mut seen_interval = false;
            for interval in pieces {
                seen_interval = true;
                let (from, to) = match interval.split_once('-') {
                    Some((a, b)) => (parse_txno(a)?, parse_txno(b)?),
                    None => {
                        let single = parse_txno(interval)?;
                        (single, single)
                    }
                };
                if from > to {
                    return Err(GateError::Malformed(format!(
                        "decreasing interval '{}'",
                        interval
                    )));
                }
                set.add_range(source, from, to);
            }
            if !seen_interval {
                return Err(GateError::Malformed(format!(
                    "source '{}' has no intervals",
                    source
                )));
            }
        }
        Ok(set)
    }

    /// Adds a single transaction.
    pub fn add(&mut self, source: &str, txno: u64) {
        self.add_range(source, txno, txno);
    }

    /// Adds an inclusive range of transactions.
    pub fn add_range(&mut self, source: &str, from: u64, to: u64) {
        let intervals = self.sources.entry(source.to_string()).or_default();
        intervals.push((from, to));
        normalize(intervals);
    }

    /// Unions another set into this one.
    pub fn merge(&mut self, other: &TransactionSet) {
        for (source, intervals) in &other.sources {
            let mine = self.sources.entry(source.clone()).or_default();
            mine.extend_from_slice(intervals);
            normalize(mine);
        }
    }

    /// True when every transaction in `other` is in this set.
    ///
    /// A source this set has never seen makes the answer false, it is not
    /// an error.
    pub fn contains(&self, other: &TransactionSet) -> bool {
        for (source, needed) in &other.sources {
            let Some(have) = self.sources.get(source) else {
                return false;
            };
            for &(from, to) in needed {
                // Normalized intervals are disjoint with gaps, so a needed
                // interval must fit inside a single applied interval.
                if !have.iter().any(|&(x, y)| x <= from && to <= y) {
                    return false;
                }
            }
        }
        true
    }

    /// True when the set names no transactions.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of sources in the set.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

fn parse_txno(text: &str) -> GateResult<u64> {
    let value: u64 = text
        .trim()
        .parse()
        .map_err(|_| GateError::Malformed(format!("bad transaction number '{}'", text)))?;
    if value == 0 {
        return Err(GateError::Malformed(
            "transaction numbers start at 1".to_string(),
        ));
    }
    Ok(value)
}

/// Sorts and coalesces intervals in place. Adjacent intervals merge:
/// `1-5` and `6-8` become `1-8`.
fn normalize(intervals: &mut Vec<(u64, u64)>) {
    intervals.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
    for &(from, to) in intervals.iter() {
        match merged.last_mut() {
            Some(last) if from <= last.1.saturating_add(1) => {
                last.1 = last.1.max(to);
            }
            _ => merged.push((from, to)),
        }
    }
    *intervals = merged;
}

impl fmt::Display for TransactionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first_source = true;
        for (source, intervals) in &self.sources {
            if !first_source {
                write!(f, ",")?;
            }
            first_source = false;
            write!(f, "{}", source)?;
            for &(from, to) in intervals {
                if from == to {
                    write!(f, ":{}", from)?;
                } else {
                    write!(f, ":{}-{}", from, to)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for TransactionSet {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionSet::parse(s)
    }
}
