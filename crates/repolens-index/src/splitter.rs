//! Size-bounded overlapping window splitter with ranked cut points.
//!
//! All offsets are in `char`s. A window of at most `chunk_size` chars is
//! cut at the best-ranked boundary in its upper half; the next window starts
//! `overlap` chars before the cut.

use std::ops::Range;

use crate::error::{IndexError, Result};

/// Generic separators, weakest last. Used for every file kind.
pub(crate) const GENERIC_SEPARATORS: &[&str] = &["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SplitPolicy {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl SplitPolicy {
    pub(crate) fn validate(self) -> Result<Self> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(IndexError::InvalidConfig(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(self)
    }
}

/// Candidate cut offsets grouped by preference. Each tier is sorted ascending.
#[derive(Debug, Default)]
pub(crate) struct CutPoints {
    tiers: Vec<Vec<usize>>,
}

impl CutPoints {
    /// Push a tier of already computed offsets (e.g. syntax node edges).
    pub(crate) fn push_offsets(&mut self, mut offsets: Vec<usize>) {
        offsets.sort_unstable();
        offsets.dedup();
        if !offsets.is_empty() {
            self.tiers.push(offsets);
        }
    }

    /// Push one tier holding every match of all `separators`.
    pub(crate) fn push_separators(&mut self, chars: &[char], separators: &[&str]) {
        let mut offsets = Vec::new();
        for sep in separators {
            offsets.extend(separator_cuts(chars, sep));
        }
        self.push_offsets(offsets);
    }

    /// Push one tier per separator, in the given order.
    pub(crate) fn push_each_separator(&mut self, chars: &[char], separators: &[&str]) {
        for sep in separators {
            self.push_offsets(separator_cuts(chars, sep));
        }
    }

    fn best_in(&self, lo: usize, hi: usize) -> Option<usize> {
        self.tiers.iter().find_map(|tier| {
            let idx = tier.partition_point(|&p| p <= hi);
            let candidate = *tier.get(idx.checked_sub(1)?)?;
            (candidate >= lo).then_some(candidate)
        })
    }
}

/// Offsets where `sep` allows a cut: after its leading newlines, or right before it.
fn separator_cuts(chars: &[char], sep: &str) -> Vec<usize> {
    let pattern: Vec<char> = sep.chars().collect();
    if pattern.is_empty() || pattern.len() > chars.len() {
        return Vec::new();
    }
    let lead = pattern.iter().take_while(|&&c| c == '\n').count();
    chars
        .windows(pattern.len())
        .enumerate()
        .filter(|(_, w)| *w == pattern.as_slice())
        .map(|(i, _)| i + lead)
        .collect()
}

/// Split `len` chars into windows following `policy` and `cuts`.
///
/// Guarantees, for a validated policy: every span is at most `chunk_size`
/// long, each span starts exactly `overlap` chars before the previous one
/// ends, and the spans cover `0..len`.
pub(crate) fn split_spans(len: usize, policy: SplitPolicy, cuts: &CutPoints) -> Vec<Range<usize>> {
    let size = policy.chunk_size.max(1);
    let overlap = policy.overlap.min(size - 1);
    let mut spans = Vec::new();
    if len == 0 {
        return spans;
    }

    let mut start = 0;
    loop {
        if len - start <= size {
            spans.push(start..len);
            break;
        }
        let hi = start + size;
        // Cutting past start + overlap guarantees the next window moves forward.
        let lo = start + overlap.max(size / 2) + 1;
        let cut = cuts.best_in(lo, hi).unwrap_or(hi);
        spans.push(start..cut);
        start = cut - overlap;
    }
    spans
}
