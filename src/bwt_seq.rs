//! The BWT-sequence layer: `C[]`, `LF`, backward search (`matchBounds`),
//! its forward-extension variants, and locate, all built on top of an
//! [`EisReader`].
//!
//! Callers are expected to build the wrapped index from the BWT of `T$`
//! (the original text with a unique terminator symbol, internal id `0`,
//! appended) so that `sequence_length() == text.len() + 1` and every
//! rotation is distinguishable — the standard precondition for `LF` to be
//! well defined.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::{Config, RangeSort};
use crate::context::{ContextRetriever, LfSource};
use crate::eis::{EisReader, Hint};
use crate::error::{Error, Result};

const TERMINATOR: u8 = 0;

/// The per-position locate marks actually observed, keyed by BWT row.
/// Which rows get an entry is governed by the `rangeSort[]` policy of the
/// alphabet range the row's symbol belongs to: `None` rows never get an
/// entry (resolved purely by LF-walking to the next marked row), `Direct`
/// rows always do, `Sampled { stride }` rows do every `stride`-th row.
struct LocateSampler {
    marks: HashMap<u64, u64>,
}

impl LocateSampler {
    fn get(&self, bwt_pos: u64) -> Option<u64> {
        self.marks.get(&bwt_pos).copied()
    }
}

fn should_mark(policy: RangeSort, bwt_pos: u64) -> bool {
    match policy {
        RangeSort::None => false,
        RangeSort::Direct => true,
        RangeSort::Sampled { stride } => bwt_pos % stride as u64 == 0,
    }
}

pub struct BwtSequence {
    eis: EisReader,
    /// `C[s]`: number of BWT symbols strictly smaller than `s`, one entry
    /// per internal symbol plus a sentinel, `C[alphabet.size()] == N`.
    c: Vec<u64>,
    locate: Option<LocateSampler>,
    context: Option<ContextRetriever>,
    hint: RefCell<Hint>,
}

impl BwtSequence {
    /// Wraps `eis` with no locate or context-retrieval support; only
    /// `rank`/`get`/`LF`/`matchBounds` are available.
    pub fn wrap(eis: EisReader) -> Result<Self> {
        let c = build_c_table(&eis);
        Ok(Self {
            eis,
            c,
            locate: None,
            context: None,
            hint: RefCell::new(Hint::default()),
        })
    }

    /// Wraps `eis` and builds locate + context-retrieval support from a
    /// stream of suffix-array entries delivered in increasing BWT-position
    /// order, sampling every `locate_stride`-th row uniformly (every
    /// alphabet range gets the same `Sampled { stride: locate_stride }`
    /// policy). Use [`Self::wrap_with_locate_policy`] for a per-range
    /// sampling policy, or [`Self::wrap_with_config`] to drive both from a
    /// [`Config`].
    pub fn wrap_with_locate(
        eis: EisReader,
        sa_entries: impl IntoIterator<Item = u64>,
        locate_stride: u64,
        map_interval_log2: Option<u32>,
    ) -> Result<Self> {
        let stride = locate_stride.clamp(1, u32::MAX as u64) as u32;
        Self::wrap_with_locate_policy(eis, sa_entries, map_interval_log2, |_range| {
            RangeSort::Sampled { stride }
        })
    }

    /// Wraps `eis` using `config`'s `default_range_sort` as the locate
    /// policy for every alphabet range and `config`'s `map_interval_log2`
    /// for the context retriever's sampling stride.
    pub fn wrap_with_config(
        eis: EisReader,
        sa_entries: impl IntoIterator<Item = u64>,
        config: &Config,
    ) -> Result<Self> {
        let policy = config.default_range_sort_policy();
        let map_interval_log2 = config.map_interval().to_option();
        Self::wrap_with_locate_policy(eis, sa_entries, map_interval_log2, |_range| policy)
    }

    /// Wraps `eis` and builds locate + context-retrieval support, deciding
    /// whether each BWT row is "marked" (carries a directly stored text
    /// offset) from the [`RangeSort`] policy of the alphabet range its
    /// symbol belongs to — `range_sort(None)` is consulted for rows whose
    /// symbol falls outside every declared range (should not normally
    /// happen, but is handled the same as any other range).
    ///
    /// An unmarked row is still reachable: `locate` walks `LF` forward from
    /// it until a marked row (or the terminator) is found, so a `None`
    /// policy on every range degenerates to "no locate info anywhere but
    /// the terminator," which only terminates in bounded steps if at least
    /// one row on every LF-cycle is eventually marked — in practice callers
    /// give at least one range a `Sampled`/`Direct` policy.
    pub fn wrap_with_locate_policy(
        eis: EisReader,
        sa_entries: impl IntoIterator<Item = u64>,
        map_interval_log2: Option<u32>,
        range_sort: impl Fn(Option<usize>) -> RangeSort,
    ) -> Result<Self> {
        let c = build_c_table(&eis);
        let n = eis.sequence_length();

        let mut marks = HashMap::new();
        let mut factory = crate::context::ContextFactory::new(n, map_interval_log2);
        let mut hint = Hint::default();

        for (bwt_pos, sa_i) in sa_entries.into_iter().enumerate() {
            let bwt_pos = bwt_pos as u64;
            let sym = eis.get(bwt_pos, &mut hint);
            let range = eis.alphabet().range_of(sym);
            if should_mark(range_sort(range), bwt_pos) {
                marks.insert(bwt_pos, sa_i);
            }
            factory.observe(bwt_pos, sa_i);
        }

        let context = factory.finish(None)?;

        Ok(Self {
            eis,
            c,
            locate: Some(LocateSampler { marks }),
            context: Some(context),
            hint: RefCell::new(Hint::default()),
        })
    }

    pub fn sequence_length(&self) -> u64 {
        self.eis.sequence_length()
    }

    pub fn has_locate(&self) -> bool {
        self.locate.is_some()
    }

    /// The symbol at BWT position `i`.
    pub fn get(&self, i: u64) -> u8 {
        self.eis.get(i, &mut self.hint.borrow_mut())
    }

    pub fn rank(&self, sym: u8, pos: u64) -> u64 {
        self.eis.rank(sym, pos, &mut self.hint.borrow_mut())
    }

    /// `C[s+1] - C[s]`: total occurrences of `s` in the BWT.
    pub fn total_count(&self, sym: u8) -> u64 {
        self.c[sym as usize + 1] - self.c[sym as usize]
    }

    /// `LF(i)`: the row of the rotation one character longer, obtained by
    /// prepending `bwt[i]`.
    pub fn lf(&self, i: u64) -> u64 {
        let sym = self.get(i);
        self.c[sym as usize] + self.rank(sym, i)
    }

    /// Backward search: `matchBounds(query) -> (l, r)`, a half-open BWT
    /// row interval of size `occurrences(query, T)`.
    pub fn match_bounds(&self, query: &[u8]) -> (u64, u64) {
        let mut l = 0u64;
        let mut r = self.eis.sequence_length();

        for &sym in query.iter().rev() {
            if l >= r {
                break;
            }
            let occ_l = self.rank(sym, l);
            let occ_r = self.rank(sym, r);
            l = self.c[sym as usize] + occ_l;
            r = self.c[sym as usize] + occ_r;
        }
        (l, r)
    }

    /// Extends the search one symbol at a time starting from the end of
    /// `query`, returning the shortest trailing-suffix length whose match
    /// becomes unique (interval size 1), or `None` if even the whole
    /// query is non-unique.
    pub fn unique_forward(&self, query: &[u8]) -> Option<usize> {
        let n = query.len();
        for k in 1..=n {
            let (l, r) = self.match_bounds(&query[n - k..]);
            if r <= l {
                return None;
            }
            if r - l == 1 {
                return Some(k);
            }
        }
        None
    }

    /// The longest trailing-suffix length of `query` with a non-empty
    /// match, together with that match's left BWT-row boundary.
    pub fn mstats_forward(&self, query: &[u8]) -> (usize, u64) {
        let n = query.len();
        let mut best = (0usize, 0u64);
        for k in 1..=n {
            let (l, r) = self.match_bounds(&query[n - k..]);
            if l >= r {
                break;
            }
            best = (k, l);
        }
        best
    }

    /// `locate(i)`: the text position of BWT row `i`.
    pub fn locate(&self, mut i: u64) -> Result<u64> {
        let sampler = self
            .locate
            .as_ref()
            .ok_or_else(|| Error::config("locate requested on an index without locate support"))?;

        let n = self.sequence_length();
        let mut steps = 0u64;

        loop {
            if let Some(text_pos) = sampler.get(i) {
                return Ok((text_pos + steps) % n);
            }
            let sym = self.get(i);
            if sym == TERMINATOR {
                return Ok(steps % n);
            }
            i = self.lf(i);
            steps += 1;
        }
    }

    /// `exactMatchIterator(query, forward)`: every text position where
    /// `query` occurs. `forward` only controls output order (ascending
    /// when set); occurrence identification is identical either way.
    pub fn exact_match_iterator(&self, query: &[u8], forward: bool) -> Result<Vec<u64>> {
        let (l, r) = self.match_bounds(query);
        let mut positions = Vec::with_capacity((r.saturating_sub(l)) as usize);
        for bwt_pos in l..r {
            positions.push(self.locate(bwt_pos)?);
        }
        if forward {
            positions.sort_unstable();
        }
        Ok(positions)
    }

    /// Regenerates `T[start .. start+len)` by walking `LF` from the
    /// nearest sampled context mark.
    pub fn access_subsequence(&self, start: u64, len: usize, out: &mut [u8]) -> Result<()> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| Error::config("context retrieval requested without locate support"))?;
        context.access_subsequence(start, len, self, out);
        Ok(())
    }

    /// The BWT row whose suffix starts at text position 0 — the starting
    /// point for full backward regeneration.
    pub fn primary_index(&self) -> u64 {
        find_unique_occurrence(&self.eis, &mut self.hint.borrow_mut(), TERMINATOR)
    }
}

impl LfSource for BwtSequence {
    fn lf(&self, bwt_pos: u64) -> u64 {
        BwtSequence::lf(self, bwt_pos)
    }

    fn symbol_at(&self, bwt_pos: u64) -> u8 {
        self.get(bwt_pos)
    }

    fn sequence_length(&self) -> u64 {
        self.eis.sequence_length()
    }
}

fn build_c_table(eis: &EisReader) -> Vec<u64> {
    let size = eis.alphabet().size();
    let mut hint = Hint::default();
    let mut c = vec![0u64; size + 1];
    let n = eis.sequence_length();
    for sym in 0..size {
        c[sym + 1] = c[sym] + eis.rank(sym as u8, n, &mut hint);
    }
    c
}

/// Binary search over the monotone `rank` function to find the (single)
/// position where `sym` occurs, used to locate the primary index.
fn find_unique_occurrence(eis: &EisReader, hint: &mut Hint, sym: u8) -> u64 {
    let mut lo = 0u64;
    let mut hi = eis.sequence_length();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if eis.rank(sym, mid + 1, hint) >= 1 {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{AlphabetPartition, RangeMode};
    use crate::config::Config;
    use crate::eis::builder::EisBuilder;

    /// Builds a terminator-prefixed alphabet (`$` = internal id 0) plus
    /// ACGT, the shape every `BwtSequence` test needs.
    fn dna_with_terminator() -> AlphabetPartition {
        AlphabetPartition::new(&[(b"ACGT".to_vec(), RangeMode::BlockComposition)]).unwrap()
    }

    fn naive_bwt(text_with_terminator: &[u8]) -> (Vec<u8>, Vec<usize>) {
        let n = text_with_terminator.len();
        let mut sa: Vec<usize> = (0..n).collect();
        sa.sort_by_key(|&i| {
            let mut rotation = text_with_terminator[i..].to_vec();
            rotation.extend_from_slice(&text_with_terminator[..i]);
            rotation
        });
        let bwt: Vec<u8> = sa
            .iter()
            .map(|&i| text_with_terminator[(i + n - 1) % n])
            .collect();
        (bwt, sa)
    }

    fn build_bwt_seq(text: &str) -> (BwtSequence, AlphabetPartition, Vec<usize>) {
        let alphabet = dna_with_terminator();

        let internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let mut full = internal.clone();
        full.push(0); // terminator internal id

        let (bwt, sa) = naive_bwt(&full);
        let n = bwt.len() as u64;

        let config = Config::new().block_size(2).blocks_per_bucket(2);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
        let built = builder.build(bwt.clone().into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();

        let sa_u64: Vec<u64> = sa.iter().map(|&v| v as u64).collect();
        let bwt_seq =
            BwtSequence::wrap_with_locate(reader, sa_u64, 2, Some(1)).unwrap();

        (bwt_seq, alphabet, sa)
    }

    #[test]
    fn c_table_matches_total_counts() {
        let (bwt_seq, alphabet, _) = build_bwt_seq("ACGTACGT");
        for sym in 0..alphabet.size() as u8 {
            let total = bwt_seq.total_count(sym);
            let direct = bwt_seq.rank(sym, bwt_seq.sequence_length());
            assert_eq!(total, direct);
        }
    }

    #[test]
    fn match_bounds_finds_known_substring() {
        let (bwt_seq, alphabet, _) = build_bwt_seq("ACGTACGTACGT");
        let query: Vec<u8> = "CGTA".bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let (l, r) = bwt_seq.match_bounds(&query);
        assert_eq!(r - l, 2); // "CGTA" occurs at text positions 1 and 5
    }

    #[test]
    fn locate_matches_naive_occurrences() {
        let (bwt_seq, alphabet, _) = build_bwt_seq("ACGTACGTACGT");
        let query: Vec<u8> = "CGTA".bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let mut positions = bwt_seq.exact_match_iterator(&query, true).unwrap();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 5]);
    }

    #[test]
    fn backwards_regeneration_reproduces_text_in_reverse() {
        let text = "ACGTACGT";
        let (bwt_seq, alphabet, _) = build_bwt_seq(text);
        let expected_internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();

        let mut row = bwt_seq.primary_index();
        let mut regenerated_reverse = Vec::new();
        for _ in 0..text.len() {
            row = bwt_seq.lf(row);
            regenerated_reverse.push(bwt_seq.get(row));
        }
        let mut regenerated_forward = regenerated_reverse.clone();
        regenerated_forward.reverse();
        assert_eq!(regenerated_forward, expected_internal);
    }

    #[test]
    fn access_subsequence_matches_known_text() {
        let text = "ACGTACGTACGTACGT";
        let (bwt_seq, alphabet, _) = build_bwt_seq(text);
        let expected: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();

        let mut out = vec![0u8; 5];
        bwt_seq.access_subsequence(3, 5, &mut out).unwrap();
        assert_eq!(out, expected[3..8]);
    }

    /// A `RegionList` range can be given a `None` locate policy (no
    /// position in it is ever directly marked) while a `BlockComposition`
    /// range is given `Direct`; `locate` must still resolve every row by
    /// walking `LF` to the nearest marked row, regardless of which range
    /// started the walk.
    #[test]
    fn per_range_locate_policy_resolves_unmarked_ranges_via_lf_walk() {
        use crate::alphabet::ascii_dna_with_n;

        let alphabet = ascii_dna_with_n().unwrap();
        let text = "ACGTNNNACGTNACGT";
        let internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let mut full = internal;
        full.push(0);

        let (bwt, sa) = naive_bwt(&full);
        let n = bwt.len() as u64;

        let config = Config::new().block_size(4).blocks_per_bucket(2);
        let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
        let built = builder.build(bwt.into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();

        let n_range = alphabet.range_of(alphabet.map(b'N').unwrap());
        let sa_u64: Vec<u64> = sa.iter().map(|&v| v as u64).collect();
        let bwt_seq = BwtSequence::wrap_with_locate_policy(reader, sa_u64.clone(), Some(1), |range| {
            if range == n_range {
                RangeSort::None
            } else {
                RangeSort::Direct
            }
        })
        .unwrap();

        for (bwt_pos, &expected) in sa_u64.iter().enumerate() {
            assert_eq!(bwt_seq.locate(bwt_pos as u64).unwrap(), expected);
        }
    }

    #[test]
    fn wrap_with_config_uses_configured_default_range_sort() {
        let alphabet = dna_with_terminator();
        let internal: Vec<u8> = "ACGTACGT".bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let mut full = internal;
        full.push(0);
        let (bwt, sa) = naive_bwt(&full);
        let n = bwt.len() as u64;

        let config = Config::new()
            .block_size(2)
            .blocks_per_bucket(2)
            .default_range_sort(RangeSort::Direct);
        let builder = EisBuilder::new(alphabet.clone(), config.clone()).unwrap();
        let built = builder.build(bwt.into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();

        let sa_u64: Vec<u64> = sa.iter().map(|&v| v as u64).collect();
        let bwt_seq = BwtSequence::wrap_with_config(reader, sa_u64.clone(), &config).unwrap();

        for (bwt_pos, &expected) in sa_u64.iter().enumerate() {
            assert_eq!(bwt_seq.locate(bwt_pos as u64).unwrap(), expected);
        }
    }
}
