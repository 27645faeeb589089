//! Typed GTID sets
//!
//! Text form: `uuid:1-5:7,uuid2:1-3`. MySQL inserts a newline after each
//! comma in `@@gtid_executed`; whitespace around tokens is ignored on parse
//! and never written back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use super::errors::{GtidError, GtidResult};

/// Inclusive range of transaction sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    start: u64,
    end: u64,
}

impl Interval {
    /// Create an interval `start-end`. Sequence numbers start at 1.
    pub fn new(start: u64, end: u64) -> GtidResult<Self> {
        if start == 0 || start > end {
            return Err(GtidError::invalid_interval(&format!("{}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Create a single-transaction interval.
    pub fn single(gno: u64) -> GtidResult<Self> {
        Self::new(gno, gno)
    }

    /// First sequence number.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last sequence number (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of transactions covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Intervals are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Check whether `gno` falls inside this interval.
    pub fn contains(&self, gno: u64) -> bool {
        self.start <= gno && gno <= self.end
    }

    fn parse(text: &str) -> GtidResult<Self> {
        let number = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| GtidError::invalid_interval(text))
        };
        let interval = match text.split_once('-') {
            Some((start, end)) => Self::new(number(start)?, number(end)?),
            None => Self::single(number(text)?),
        };
        interval.map_err(|_| GtidError::invalid_interval(text))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One `<uuid>:<interval>[:<interval>...]` token.
///
/// A parsed token is written back as it was read, minus whitespace. Tokens
/// built by set algebra are written in canonical form.
#[derive(Debug, Clone)]
pub struct GtidEntry {
    source: Uuid,
    intervals: Vec<Interval>,
    text: Option<String>,
}

impl PartialEq for GtidEntry {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.intervals == other.intervals
    }
}

impl Eq for GtidEntry {}

impl GtidEntry {
    /// Create an entry. Intervals are kept in the given order.
    pub fn new(source: Uuid, intervals: Vec<Interval>) -> Self {
        Self {
            source,
            intervals,
            text: None,
        }
    }

    /// Originating server UUID.
    pub fn source(&self) -> Uuid {
        self.source
    }

    /// Intervals as written.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    fn parse(token: &str) -> GtidResult<Self> {
        let mut parts = token.split(':');
        let uuid_part = parts.next().unwrap_or_default().trim();
        if uuid_part.is_empty() {
            return Err(GtidError::empty_token(token));
        }
        let source = Uuid::parse_str(uuid_part).map_err(|_| GtidError::invalid_uuid(token))?;

        let intervals = parts.map(Interval::parse).collect::<GtidResult<Vec<_>>>()?;
        if intervals.is_empty() {
            return Err(GtidError::empty_token(token));
        }
        Ok(Self {
            source,
            intervals,
            text: Some(token.split_whitespace().collect()),
        })
    }
}

impl fmt::Display for GtidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.text {
            return f.write_str(text);
        }
        write!(f, "{}", self.source.hyphenated())?;
        for interval in &self.intervals {
            write!(f, ":{}", interval)?;
        }
        Ok(())
    }
}

/// An ordered GTID set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtidSet {
    entries: Vec<GtidEntry>,
}

impl GtidSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from entries, keeping their order.
    pub fn from_entries(entries: Vec<GtidEntry>) -> Self {
        Self { entries }
    }

    /// Parse MySQL GTID set text. Blank text is the empty set.
    pub fn parse(text: &str) -> GtidResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }
        let entries = text
            .split(',')
            .map(|token| {
                let token = token.trim();
                if token.is_empty() {
                    Err(GtidError::empty_token(token))
                } else {
                    GtidEntry::parse(token)
                }
            })
            .collect::<GtidResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Tokens in their original order.
    pub fn entries(&self) -> &[GtidEntry] {
        &self.entries
    }

    /// True when no GTID is contained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct source UUIDs in first-seen order.
    pub fn uuids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(GtidEntry::source)
            .filter(|uuid| seen.insert(*uuid))
            .collect()
    }

    /// Check whether a single GTID is contained.
    pub fn contains(&self, source: Uuid, gno: u64) -> bool {
        self.entries
            .iter()
            .filter(|e| e.source == source)
            .any(|e| e.intervals.iter().any(|i| i.contains(gno)))
    }

    /// Keep only the tokens whose source is not in `sources`, preserving order.
    pub fn without_sources(&self, sources: &HashSet<Uuid>) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| !sources.contains(&e.source))
                .cloned()
                .collect(),
        }
    }

    /// Union of two sets, normalized per source.
    pub fn union(&self, other: &GtidSet) -> GtidSet {
        let mut merged = self.clone();
        merged.entries.extend(other.entries.iter().cloned());
        merged.normalized()
    }

    /// Every GTID of `self` that is not in `other`, normalized per source.
    pub fn subtract(&self, other: &GtidSet) -> GtidSet {
        let removed: HashMap<Uuid, Vec<Interval>> = other.normalized().into_map();

        let entries = self
            .normalized()
            .entries
            .into_iter()
            .filter_map(|entry| {
                let remaining = match removed.get(&entry.source) {
                    Some(cuts) => subtract_intervals(&entry.intervals, cuts),
                    None => entry.intervals,
                };
                if remaining.is_empty() {
                    None
                } else {
                    Some(GtidEntry::new(entry.source, remaining))
                }
            })
            .collect();

        GtidSet { entries }
    }

    /// Check whether every GTID of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &GtidSet) -> bool {
        self.subtract(other).is_empty()
    }

    /// One entry per source, intervals sorted and coalesced.
    pub fn normalized(&self) -> GtidSet {
        let mut order = Vec::new();
        let mut by_source: HashMap<Uuid, Vec<Interval>> = HashMap::new();
        for entry in &self.entries {
            by_source
                .entry(entry.source)
                .or_insert_with(|| {
                    order.push(entry.source);
                    Vec::new()
                })
                .extend(entry.intervals.iter().copied());
        }

        let entries = order
            .into_iter()
            .map(|source| {
                let intervals = by_source.remove(&source).unwrap_or_default();
                GtidEntry::new(source, coalesce(intervals))
            })
            .collect();
        GtidSet { entries }
    }

    fn into_map(self) -> HashMap<Uuid, Vec<Interval>> {
        self.entries
            .into_iter()
            .map(|e| (e.source, e.intervals))
            .collect()
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl FromStr for GtidSet {
    type Err = GtidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn coalesce(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort();
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match out.last_mut() {
            Some(last) if interval.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(interval.end);
            }
            _ => out.push(interval),
        }
    }
    out
}

/// Both inputs must be coalesced.
fn subtract_intervals(from: &[Interval], cuts: &[Interval]) -> Vec<Interval> {
    let mut out = Vec::new();
    for interval in from {
        let mut start = interval.start;
        let end = interval.end;
        let mut remaining = true;
        for cut in cuts {
            if cut.end < start || cut.start > end {
                continue;
            }
            if cut.start > start {
                out.push(Interval {
                    start,
                    end: cut.start - 1,
                });
            }
            if cut.end >= end {
                remaining = false;
                break;
            }
            start = cut.end + 1;
        }
        if remaining {
            out.push(Interval { start, end });
        }
    }
    out
}
