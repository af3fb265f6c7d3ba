//! The composition/permutation table.
//!
//! For a dense alphabet of size `a`, a block of `b` symbols is canonically
//! decomposed into a *composition* (the multiset: how many of each symbol)
//! and a *permutation* (which arrangement of that multiset the block
//! equals). `CompPermTable` precomputes, for a given `(b, a)`, the number
//! of compositions and, per composition, the bit width needed to name one
//! of its permutations — the quantities the builder needs to size its
//! constant- and variable-width bitstrings.
//!
//! Rather than materializing every permutation of every composition as a
//! flat lookup table (tractable only for genome-sized alphabets),
//! `rank_permutation`/`unrank_permutation` rank and unrank permutations
//! algorithmically with a combinatorial number system. This keeps the
//! precomputed table itself — the part a caller's `composition_table_budget`
//! actually needs to bound — to one `usize` pair per composition instead of
//! one entry per permutation, while remaining deterministic in exactly the
//! way builder and reader must agree on: both reconstruct the table from
//! `(b, a)` alone.

use crate::bitpack::bit_width;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CompPermTable {
    b: usize,
    a: usize,
    num_compositions: usize,
    /// composition index width `C = ceil(log2(numCompositions))`.
    comp_index_width: u32,
    /// per-composition permutation-count bit width `p_i`.
    perm_widths: Vec<u32>,
    /// binomial(n, k) cache sized (b + a, a), used by both the composition
    /// and the permutation combinatorial number systems.
    binom: Vec<Vec<u64>>,
}

impl CompPermTable {
    /// Builds the table for block size `b` over a dense alphabet of size
    /// `a`. Fails with `Error::Configuration` when `C(b+a-1, a-1)` would
    /// exceed `budget` (number of compositions) rather than attempting an
    /// unbounded allocation.
    pub fn build(b: usize, a: usize, budget: usize) -> Result<Self> {
        if b == 0 || a == 0 {
            return Err(Error::config("block size and alphabet size must be nonzero"));
        }

        // columns must cover both the composition rank's `a-1` and the
        // permutation numerator's per-symbol counts, which range up to `b`.
        let binom = build_binomial_table(b + a, b.max(a).max(1));

        let num_compositions = checked_binom(&binom, b + a - 1, a - 1)?;
        if num_compositions > budget {
            return Err(Error::config(format!(
                "composition table for (b={b}, a={a}) would need {num_compositions} entries, \
                 exceeding the configured budget of {budget}"
            )));
        }

        let comp_index_width = bit_width(num_compositions as u64).max(1);

        let mut table = Self {
            b,
            a,
            num_compositions,
            comp_index_width,
            perm_widths: Vec::with_capacity(num_compositions),
            binom,
        };

        let mut counts = vec![0u32; a];
        for comp_idx in 0..num_compositions {
            table.unrank_composition(comp_idx, &mut counts);
            let num_perms = table.num_permutations(&counts);
            table.perm_widths.push(bit_width(num_perms).max(1));
        }

        Ok(table)
    }

    pub fn block_size(&self) -> usize {
        self.b
    }

    pub fn alphabet_size(&self) -> usize {
        self.a
    }

    pub fn num_compositions(&self) -> usize {
        self.num_compositions
    }

    pub fn comp_index_width(&self) -> u32 {
        self.comp_index_width
    }

    /// The variable bit width needed to store a permutation index for
    /// `comp_idx`.
    pub fn perm_width(&self, comp_idx: usize) -> u32 {
        self.perm_widths[comp_idx]
    }

    /// The maximum permutation bit width over all compositions.
    pub fn max_perm_width(&self) -> u32 {
        self.perm_widths.iter().copied().max().unwrap_or(0)
    }

    /// Canonicalises a block of `self.b` symbols (each `< self.a`) into a
    /// `(compIdx, permIdx)` pair.
    pub fn block_to_index_pair(&self, block: &[u8]) -> (usize, usize) {
        debug_assert_eq!(block.len(), self.b);

        let mut counts = vec![0u32; self.a];
        for &s in block {
            counts[s as usize] += 1;
        }

        let comp_idx = self.rank_composition(&counts);
        let perm_idx = self.rank_permutation(block, &counts);

        (comp_idx, perm_idx)
    }

    /// Writes the first `sublen` symbols of the canonical unranking of
    /// `(comp_idx, perm_idx)` into `block`.
    pub fn index_pair_to_block(&self, comp_idx: usize, perm_idx: usize, block: &mut [u8], sublen: usize) {
        let mut counts = vec![0u32; self.a];
        self.unrank_composition(comp_idx, &mut counts);
        self.unrank_permutation(perm_idx, &mut counts, block, sublen);
    }

    /// The count of `sym` within composition `comp_idx`.
    pub fn sym_count_from_composition(&self, comp_idx: usize, sym: u8) -> usize {
        let mut counts = vec![0u32; self.a];
        self.unrank_composition(comp_idx, &mut counts);
        counts[sym as usize] as usize
    }

    /// Adds all `a` counts of composition `comp_idx` into `counts`.
    pub fn add_sym_counts_from_composition(&self, comp_idx: usize, counts: &mut [usize]) {
        let mut comp_counts = vec![0u32; self.a];
        self.unrank_composition(comp_idx, &mut comp_counts);
        for (c, cc) in counts.iter_mut().zip(comp_counts) {
            *c += cc as usize;
        }
    }

    fn binom(&self, n: usize, k: usize) -> u64 {
        if k > n {
            return 0;
        }
        self.binom[n][k]
    }

    /// Number of compositions of `sum` into `parts` nonnegative parts:
    /// `C(sum + parts - 1, parts - 1)`, with the convention that there is
    /// exactly one way to distribute `sum` into a single part.
    fn num_compositions_of(&self, sum: u32, parts: usize) -> u64 {
        if parts <= 1 {
            return 1;
        }
        self.binom(sum as usize + parts - 1, parts - 1)
    }

    fn rank_composition(&self, counts: &[u32]) -> usize {
        let mut idx: u64 = 0;
        let mut remaining_sum = self.b as u32;

        for i in 0..self.a - 1 {
            for k in 0..counts[i] {
                idx += self.num_compositions_of(remaining_sum - k, self.a - i - 1);
            }
            remaining_sum -= counts[i];
        }

        idx as usize
    }

    fn unrank_composition(&self, mut idx: usize, counts: &mut [u32]) {
        let mut remaining_sum = self.b as u32;

        for i in 0..self.a - 1 {
            let remaining_parts = self.a - i - 1;
            let mut c_i = 0u32;
            loop {
                let amt = self.num_compositions_of(remaining_sum - c_i, remaining_parts) as usize;
                if idx < amt || c_i == remaining_sum {
                    break;
                }
                idx -= amt;
                c_i += 1;
            }
            counts[i] = c_i;
            remaining_sum -= c_i;
        }
        counts[self.a - 1] = remaining_sum;
    }

    /// Multinomial coefficient `len! / prod(counts[i]!)`, the number of
    /// distinct arrangements of a multiset with the given per-symbol
    /// counts summing to `len`.
    fn num_permutations_of(&self, counts: &[u32], len: u32) -> u64 {
        let mut result: u64 = 1;
        let mut remaining = len;
        for &c in counts {
            if c == 0 {
                continue;
            }
            // multiply by C(remaining, c), then shrink remaining
            result *= self.binom(remaining as usize, c as usize);
            remaining -= c;
        }
        result
    }

    fn num_permutations(&self, counts: &[u32]) -> u64 {
        self.num_permutations_of(counts, self.b as u32)
    }

    fn rank_permutation(&self, block: &[u8], counts: &[u32]) -> usize {
        let mut remaining = counts.to_vec();
        let mut remaining_len = self.b as u32;
        let mut rank: u64 = 0;

        for &sym in block {
            let sym = sym as usize;
            for s in 0..sym {
                if remaining[s] > 0 {
                    remaining[s] -= 1;
                    rank += self.num_permutations_of(&remaining, remaining_len - 1);
                    remaining[s] += 1;
                }
            }
            remaining[sym] -= 1;
            remaining_len -= 1;
        }

        rank as usize
    }

    fn unrank_permutation(&self, mut idx: usize, counts: &mut [u32], block: &mut [u8], sublen: usize) {
        let mut remaining_len = self.b as u32;

        for pos in 0..self.b {
            for s in 0..self.a {
                if counts[s] == 0 {
                    continue;
                }
                counts[s] -= 1;
                let cnt = self.num_permutations_of(counts, remaining_len - 1) as usize;
                if idx < cnt {
                    if pos < sublen {
                        block[pos] = s as u8;
                    }
                    remaining_len -= 1;
                    break;
                } else {
                    idx -= cnt;
                    counts[s] += 1;
                }
            }
        }
    }
}

fn build_binomial_table(max_n: usize, max_k: usize) -> Vec<Vec<u64>> {
    let max_k = max_k.max(1);
    let mut binom = vec![vec![0u64; max_k + 1]; max_n + 1];
    for n in 0..=max_n {
        binom[n][0] = 1;
        for k in 1..=max_k.min(n) {
            binom[n][k] = binom[n - 1][k - 1].saturating_add(if k <= n - 1 { binom[n - 1][k] } else { 0 });
        }
    }
    binom
}

fn checked_binom(binom: &[Vec<u64>], n: usize, k: usize) -> Result<usize> {
    if n >= binom.len() || k >= binom[n].len() {
        return Err(Error::config("composition table parameters out of range"));
    }
    let value = binom[n][k];
    usize::try_from(value).map_err(|_| Error::config("composition table would exceed addressable range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_budget_overflow() {
        let err = CompPermTable::build(16, 20, 10);
        assert!(err.is_err());
    }

    #[test]
    fn small_table_round_trips() {
        let table = CompPermTable::build(4, 3, 10_000).unwrap();

        let mut seen_pairs = std::collections::HashSet::new();

        for c0 in 0..=4u8 {
            for c1 in 0..=(4 - c0) {
                let c2 = 4 - c0 - c1;
                let mut block = Vec::new();
                block.extend(std::iter::repeat_n(0u8, c0 as usize));
                block.extend(std::iter::repeat_n(1u8, c1 as usize));
                block.extend(std::iter::repeat_n(2u8, c2 as usize));

                // enumerate every distinct permutation by trying all orderings via next_permutation-ish brute force
                let mut perm = block.clone();
                perm.sort();
                loop {
                    let (comp_idx, perm_idx) = table.block_to_index_pair(&perm);
                    assert!(seen_pairs.insert((comp_idx, perm_idx)), "duplicate pair for {perm:?}");

                    let mut recovered = vec![0u8; 4];
                    table.index_pair_to_block(comp_idx, perm_idx, &mut recovered, 4);
                    assert_eq!(recovered, perm);

                    if !next_permutation(&mut perm) {
                        break;
                    }
                }
            }
        }
    }

    fn next_permutation(arr: &mut [u8]) -> bool {
        if arr.len() < 2 {
            return false;
        }
        let mut i = arr.len() - 1;
        while i > 0 && arr[i - 1] >= arr[i] {
            i -= 1;
        }
        if i == 0 {
            return false;
        }
        let mut j = arr.len() - 1;
        while arr[j] <= arr[i - 1] {
            j -= 1;
        }
        arr.swap(i - 1, j);
        arr[i..].reverse();
        true
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            b in 1usize..=8,
            a in 1usize..=5,
            seed in any::<u64>(),
        ) {
            use rand::{SeedableRng, Rng};
            use rand_chacha::ChaCha8Rng;

            let table = match CompPermTable::build(b, a, 1_000_000) {
                Ok(t) => t,
                Err(_) => return Ok(()),
            };

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let block: Vec<u8> = (0..b).map(|_| rng.random_range(0..a) as u8).collect();

            let (comp_idx, perm_idx) = table.block_to_index_pair(&block);
            prop_assert!(comp_idx < table.num_compositions());
            prop_assert!(perm_idx < (1u64 << table.perm_width(comp_idx)) as usize);

            let mut recovered = vec![0u8; b];
            table.index_pair_to_block(comp_idx, perm_idx, &mut recovered, b);
            prop_assert_eq!(recovered, block);
        }
    }
}
