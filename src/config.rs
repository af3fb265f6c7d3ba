//! Build-time configuration: block/bucket sizes, feature flags and the
//! locate sampling policy, exposed through a builder-style config object.

use crate::alphabet::AlphabetPartition;

/// Per-alphabet-range locate sampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeSort {
    /// No locate information stored for this range.
    #[default]
    None,
    /// Every position carries an explicit text offset.
    Direct,
    /// Every k-th position is marked; others are reached via `LF`-walk.
    Sampled { stride: u32 },
}

/// `mapIntervalLog2` for the context retriever; `Autosize` lets the
/// factory pick a stride of `⌈log2 ⌈log2 N⌉⌉`, and the loader rediscovers
/// it by trying strides in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapIntervalLog2 {
    Autosize,
    Fixed(u8),
}

impl MapIntervalLog2 {
    /// Converts to the `Option<u32>` shape [`crate::context::ContextFactory::new`]
    /// takes: `None` requests autosizing, `Some(log2)` pins the stride.
    pub fn to_option(self) -> Option<u32> {
        match self {
            MapIntervalLog2::Autosize => None,
            MapIntervalLog2::Fixed(log2) => Some(log2 as u32),
        }
    }
}

/// A builder-like API to configure and construct a block-compressed EIS.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) block_size: usize,
    pub(crate) blocks_per_bucket: usize,
    pub(crate) region_sums: bool,
    pub(crate) reversibly_sorted: bool,
    pub(crate) composition_table_budget: usize,
    pub(crate) map_interval_log2: MapIntervalLog2,
    pub(crate) default_range_sort: RangeSort,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbols per block (*b*). The default, 8, keeps
    /// both the constant-width composition index and the variable-width
    /// permutation index in a convenient byte-ish range for common
    /// nucleotide/protein alphabets.
    pub fn block_size(self, block_size: usize) -> Self {
        assert!(block_size > 0);
        Self {
            block_size,
            ..self
        }
    }

    /// Number of blocks per bucket (*B*), i.e. how often a
    /// partial-sum prologue is written.
    pub fn blocks_per_bucket(self, blocks_per_bucket: usize) -> Self {
        assert!(blocks_per_bucket > 0);
        Self {
            blocks_per_bucket,
            ..self
        }
    }

    /// Enables `EIS_FEATURE_REGION_SUMS`: periodic partial-sum sampling
    /// inside the sequence range list.
    pub fn region_sums(self, region_sums: bool) -> Self {
        Self {
            region_sums,
            ..self
        }
    }

    /// Asserts `BWTReversiblySorted`: every text position must be
    /// reachable backwards via `LF` from some sampled context-retriever
    /// mark.
    pub fn reversibly_sorted(self, reversibly_sorted: bool) -> Self {
        Self {
            reversibly_sorted,
            ..self
        }
    }

    /// Upper bound on the number of entries the composition/permutation
    /// table may contain; construction fails with
    /// [`crate::error::Error::Configuration`] rather than attempting an
    /// unbounded allocation.
    pub fn composition_table_budget(self, budget: usize) -> Self {
        Self {
            composition_table_budget: budget,
            ..self
        }
    }

    pub fn map_interval_log2(self, map_interval_log2: MapIntervalLog2) -> Self {
        Self {
            map_interval_log2,
            ..self
        }
    }

    pub fn default_range_sort(self, range_sort: RangeSort) -> Self {
        Self {
            default_range_sort: range_sort,
            ..self
        }
    }

    /// The per-range locate policy every alphabet range uses unless a
    /// caller overrides it with a more specific policy map (see
    /// `BwtSequence::wrap_with_locate_policy`).
    pub fn default_range_sort_policy(&self) -> RangeSort {
        self.default_range_sort
    }

    /// The context-retriever sampling stride this config requests.
    pub fn map_interval(&self) -> MapIntervalLog2 {
        self.map_interval_log2
    }

    pub(crate) fn validate(&self, alphabet: &AlphabetPartition) -> crate::error::Result<()> {
        use crate::error::Error;
        if alphabet.num_dense_symbols() == 0 {
            return Err(Error::config(
                "alphabet must contain at least one BlockComposition-mode symbol",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 8,
            blocks_per_bucket: 64,
            region_sums: false,
            reversibly_sorted: false,
            composition_table_budget: 1 << 20,
            map_interval_log2: MapIntervalLog2::Autosize,
            default_range_sort: RangeSort::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = Config::new();
        assert_eq!(cfg.block_size, 8);
        assert_eq!(cfg.blocks_per_bucket, 64);
        assert!(!cfg.region_sums);
    }

    #[test]
    fn builder_setters_compose() {
        let cfg = Config::new()
            .block_size(4)
            .blocks_per_bucket(4)
            .region_sums(true)
            .reversibly_sorted(true);
        assert_eq!(cfg.block_size, 4);
        assert_eq!(cfg.blocks_per_bucket, 4);
        assert!(cfg.region_sums);
        assert!(cfg.reversibly_sorted);
    }
}
