/*! A block-compressed FM-index over an externally produced BWT stream.
 *
 * `fmeis` implements the **enhanced indexed sequence (EIS)**: a
 * composition/permutation-encoded, bucket-cached rank/access structure
 * over a BWT symbol stream, together with the **BWT-sequence layer**
 * ([`BwtSequence`]) that turns it into a full FM-index (`LF`-mapping,
 * backward search, locate) and the **BWT context retriever**
 * ([`ContextRetriever`]) that regenerates arbitrary substrings of the
 * original text by walking `LF` backward from a sparse forward map.
 *
 * Suffix-array construction, FASTA/GFF parsing, and command-line
 * argument handling for callers are out of scope here; this crate
 * consumes the BWT and (optionally) the suffix array as plain streams
 * from whatever upstream producer built them.
 *
 * ## Usage
 *
 * ```
 * use fmeis::{alphabet, Config, EisBuilder, EisReader, BwtSequence};
 *
 * // a BWT symbol stream over the ACGT alphabet, already in internal ids
 * let alphabet = alphabet::ascii_dna().unwrap();
 * let bwt: Vec<u8> = "ACGTACGT"
 *     .bytes()
 *     .map(|c| alphabet.map(c).unwrap())
 *     .collect();
 * let n = bwt.len() as u64;
 *
 * let builder = EisBuilder::new(alphabet, Config::new().block_size(4)).unwrap();
 * let built = builder.build(bwt.into_iter(), n).unwrap();
 * let reader = EisReader::from_bytes(built.bytes).unwrap();
 * let index = BwtSequence::wrap(reader).unwrap();
 *
 * assert_eq!(index.total_count(index.get(0)), index.rank(index.get(0), index.sequence_length()));
 * ```
 *
 * More on the on-disk `.bdx` layout, the sampling policies available
 * for locate, and the integrity verifier can be found in the
 * module-level documentation of [`eis`], [`bwt_seq`], [`context`], and
 * [`verify`].
 */

pub mod alphabet;
pub mod bitpack;
pub mod bwt_seq;
pub mod comp_perm;
pub mod config;
pub mod context;
pub mod eis;
pub mod error;
pub mod range_list;
pub mod verify;

#[doc(inline)]
pub use alphabet::AlphabetPartition;
#[doc(inline)]
pub use bwt_seq::BwtSequence;
#[doc(inline)]
pub use comp_perm::CompPermTable;
#[doc(inline)]
pub use config::{Config, RangeSort};
#[doc(inline)]
pub use context::{ContextFactory, ContextRetriever};
#[doc(inline)]
pub use eis::{BuiltIndex, EisBuilder, EisReader};
#[doc(inline)]
pub use error::{Error, IntegrityError, Result};
