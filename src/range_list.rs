//! The sequence range list: an ordered list of `(start, length, symbol)`
//! runs recording every occurrence of a `RegionList`-mode symbol. Built up
//! append-only, then compacted and frozen into an immutable, binary-search
//! friendly view for reading.

use crate::error::{Error, Result};

/// One run: `symbol` occupies `[start, start + length)` in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: u64,
    pub length: u64,
    pub symbol: u8,
}

impl Run {
    fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// The interval over which `RegionSums` (periodic partial-sum sampling)
/// snapshots are taken, expressed as a run-count stride. Fixed at 64,
/// matching the bucket-ish granularity of the rest of the format without
/// adding a configuration knob nobody asked for.
const REGION_SUMS_STRIDE: usize = 64;

/// The build-time, append-only range list.
#[derive(Debug, Default, Clone)]
pub struct RangeList {
    runs: Vec<Run>,
    region_sums: bool,
}

impl RangeList {
    pub fn new(region_sums: bool) -> Self {
        Self {
            runs: Vec::new(),
            region_sums,
        }
    }

    /// Appends a run, merging it into the previous run if they are
    /// adjacent and share a symbol.
    pub fn append(&mut self, start: u64, length: u64, symbol: u8) {
        if length == 0 {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if last.symbol == symbol && last.end() == start {
                last.length += length;
                return;
            }
        }
        self.runs.push(Run {
            start,
            length,
            symbol,
        });
    }

    /// Appends a run unconditionally, never merging with the previous run.
    pub fn append_new_range(&mut self, start: u64, length: u64, symbol: u8) {
        if length == 0 {
            return;
        }
        self.runs.push(Run {
            start,
            length,
            symbol,
        });
    }

    /// Sorts runs by start position and coalesces adjacent
    /// identical-symbol runs. Idempotent.
    pub fn compact(&mut self) {
        self.runs.sort_by_key(|r| r.start);
        let mut compacted: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if let Some(last) = compacted.last_mut() {
                if last.symbol == run.symbol && last.end() == run.start {
                    last.length += run.length;
                    continue;
                }
            }
            compacted.push(run);
        }
        self.runs = compacted;
    }

    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn region_sums_enabled(&self) -> bool {
        self.region_sums
    }

    /// Serializes the list: run count, feature flags, then every run (plus
    /// a sentinel run beyond `text_len` so that "next run covering
    /// position >= x" queries always terminate), optionally interleaved
    /// with periodic partial-sum snapshots.
    pub fn write_to(&self, text_len: u64, num_symbols_hint: usize, out: &mut Vec<u8>) {
        let mut runs = self.runs.clone();
        runs.push(Run {
            start: text_len,
            length: 1,
            symbol: u8::MAX,
        });

        out.extend_from_slice(&(runs.len() as u64).to_ne_bytes());
        out.push(self.region_sums as u8);

        let mut running_sums = vec![0u64; num_symbols_hint];
        for (i, run) in runs.iter().enumerate() {
            out.extend_from_slice(&run.start.to_ne_bytes());
            out.extend_from_slice(&run.length.to_ne_bytes());
            out.push(run.symbol);

            if self.region_sums {
                if (run.symbol as usize) < running_sums.len() {
                    running_sums[run.symbol as usize] += run.length;
                }
                if i % REGION_SUMS_STRIDE == 0 {
                    for &s in &running_sums {
                        out.extend_from_slice(&s.to_ne_bytes());
                    }
                }
            }
        }
    }
}

/// A cursor over the range list, cached by the caller across consecutive
/// queries that progress monotonically through the text (a "search
/// hint").
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeHint {
    run_idx: usize,
}

/// The read-time, immutable view of a compacted range list.
#[derive(Debug, Clone)]
pub struct RangeListView {
    runs: Vec<Run>,
    region_sums: Vec<Vec<u64>>,
    region_sums_stride: usize,
    num_symbols: usize,
}

impl RangeListView {
    /// Parses a range list previously produced by
    /// [`RangeList::write_to`].
    pub fn parse(bytes: &[u8], num_symbols: usize) -> Result<(Self, usize)> {
        let mut pos = 0usize;
        let read_u64 = |bytes: &[u8], pos: &mut usize| -> Result<u64> {
            let slice = bytes
                .get(*pos..*pos + 8)
                .ok_or_else(|| Error::corrupt("range list: truncated while reading u64"))?;
            *pos += 8;
            Ok(u64::from_ne_bytes(slice.try_into().unwrap()))
        };

        let num_runs = read_u64(bytes, &mut pos)? as usize;
        let region_sums_flag = *bytes
            .get(pos)
            .ok_or_else(|| Error::corrupt("range list: truncated feature flags"))?;
        pos += 1;
        let has_region_sums = region_sums_flag != 0;

        let mut runs = Vec::with_capacity(num_runs);
        let mut region_sums = Vec::new();
        let mut running = vec![0u64; num_symbols];

        for i in 0..num_runs {
            let start = read_u64(bytes, &mut pos)?;
            let length = read_u64(bytes, &mut pos)?;
            let symbol = *bytes
                .get(pos)
                .ok_or_else(|| Error::corrupt("range list: truncated run symbol"))?;
            pos += 1;

            if has_region_sums {
                if (symbol as usize) < running.len() {
                    running[symbol as usize] += length;
                }
                if i % REGION_SUMS_STRIDE == 0 {
                    let mut snapshot = Vec::with_capacity(num_symbols);
                    for _ in 0..num_symbols {
                        snapshot.push(read_u64(bytes, &mut pos)?);
                    }
                    region_sums.push(snapshot);
                }
            }

            runs.push(Run {
                start,
                length,
                symbol,
            });
        }

        Ok((
            Self {
                runs,
                region_sums,
                region_sums_stride: REGION_SUMS_STRIDE,
                num_symbols,
            },
            pos,
        ))
    }

    /// The sentinel-exclusive run count (actual data runs only).
    pub fn num_runs(&self) -> usize {
        self.runs.len().saturating_sub(1)
    }

    fn advance_hint(&self, hint: &mut RangeHint, pos: u64) {
        while hint.run_idx + 1 < self.runs.len() && self.runs[hint.run_idx].end() <= pos {
            hint.run_idx += 1;
        }
    }

    /// Overlays every run intersecting `[start_pos, start_pos+len)` onto
    /// `block`, converting positions into the local block frame and
    /// remapping symbols through `remap`.
    pub fn apply_ranges_to_substring(
        &self,
        block: &mut [u8],
        start_pos: u64,
        len: usize,
        hint: &mut RangeHint,
        remap: impl Fn(u8) -> u8,
    ) {
        self.advance_hint(hint, start_pos);
        let region_end = start_pos + len as u64;

        let mut idx = hint.run_idx;
        while idx < self.runs.len() {
            let run = self.runs[idx];
            if run.start >= region_end {
                break;
            }
            let overlap_start = run.start.max(start_pos);
            let overlap_end = run.end().min(region_end);
            if overlap_start < overlap_end {
                let sym = remap(run.symbol);
                for pos in overlap_start..overlap_end {
                    block[(pos - start_pos) as usize] = sym;
                }
            }
            idx += 1;
        }
    }

    /// Number of occurrences of `sym` in `[base, pos)`.
    pub fn symbol_count_in_region(&self, base: u64, pos: u64, sym: u8, hint: &mut RangeHint) -> u64 {
        self.count_in_region(base, pos, hint, |s| s == sym)
    }

    /// Number of occurrences of any range-list symbol in `[base, pos)`.
    pub fn all_symbols_count_in_region(&self, base: u64, pos: u64, hint: &mut RangeHint) -> u64 {
        self.count_in_region(base, pos, hint, |s| s != u8::MAX)
    }

    fn count_in_region(
        &self,
        base: u64,
        pos: u64,
        hint: &mut RangeHint,
        predicate: impl Fn(u8) -> bool,
    ) -> u64 {
        if let Some(fast) = self.count_via_region_sums(base, pos, &predicate) {
            return fast;
        }

        self.advance_hint(hint, base);
        let mut total = 0u64;
        let mut idx = hint.run_idx;
        while idx < self.runs.len() {
            let run = self.runs[idx];
            if run.start >= pos {
                break;
            }
            if predicate(run.symbol) {
                let overlap_start = run.start.max(base);
                let overlap_end = run.end().min(pos);
                if overlap_start < overlap_end {
                    total += overlap_end - overlap_start;
                }
            }
            idx += 1;
        }
        total
    }

    /// Uses the periodic `RegionSums` snapshots, when available, to avoid a
    /// full scan for the common "count from the start of the text" case
    /// aligned to a sampled boundary. Falls back to `None` (full scan)
    /// whenever `base != 0`, `pos` doesn't land exactly on the end of a
    /// run (a snapshot covers whole runs, never a partial one), or that
    /// run's index isn't one of the sampled ones.
    fn count_via_region_sums(&self, base: u64, pos: u64, predicate: &impl Fn(u8) -> bool) -> Option<u64> {
        if base != 0 || self.region_sums.is_empty() {
            return None;
        }
        let run_idx = self.runs.partition_point(|r| r.start < pos);
        if run_idx == 0 {
            return Some(0);
        }
        // the snapshot taken while writing run `last_included` covers
        // exactly `[0, runs[last_included].end())`; any other `pos` needs
        // a partial count a snapshot can't give.
        let last_included = run_idx - 1;
        if self.runs[last_included].end() != pos || last_included % self.region_sums_stride != 0 {
            return None;
        }
        let sample_idx = last_included / self.region_sums_stride;
        let snapshot = self.region_sums.get(sample_idx)?;

        let mut total = 0u64;
        for (sym, &count) in snapshot.iter().enumerate() {
            if predicate(sym as u8) {
                total += count;
            }
        }
        Some(total)
    }
}
