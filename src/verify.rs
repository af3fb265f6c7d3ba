//! The integrity verifier: an independent checker that replays `locate`,
//! the `LF`-walk, and context retrieval against a reference suffix array
//! supplied by an external producer.
//!
//! It is built directly on `BwtSequence`/`ContextRetriever`; there is no
//! dedicated query path of its own, only a replay of the public API
//! against an independently supplied ground truth.

use crate::bwt_seq::BwtSequence;
use crate::error::{Error, IntegrityError, Result};

/// Which checks to run: suffix-array agreement, the backward `LF`-walk,
/// and substring context retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyFlags {
    pub sufval: bool,
    pub lfmapwalk: bool,
    pub context: bool,
}

impl VerifyFlags {
    pub fn all() -> Self {
        Self {
            sufval: true,
            lfmapwalk: true,
            context: true,
        }
    }
}

/// The external "reference suffix array" collaborator: a ground-truth
/// suffix array plus the internal-alphabet text it was built over
/// (terminator included), against which the index is re-checked.
pub struct Reference<'a> {
    /// `suffix_array[i]` is the text position of BWT row `i`.
    pub suffix_array: &'a [u64],
    /// The text the suffix array was built over, terminator (internal id
    /// `0`) appended, internal symbol ids already applied.
    pub text: &'a [u8],
}

/// The width of the windows [`run`] probes for the `CONTEXT` check; small
/// enough to exercise several context marks even on short test texts.
const CONTEXT_WINDOW: usize = 8;

/// Replays the requested checks against `reference`, returning the first
/// discrepancy found as an [`Error::IntegrityMismatch`].
pub fn run(bwt_seq: &BwtSequence, reference: &Reference, flags: VerifyFlags) -> Result<()> {
    let n = bwt_seq.sequence_length();
    if n != reference.text.len() as u64 {
        return Err(Error::IntegrityMismatch(IntegrityError::LengthMismatch {
            index: n as usize,
            reference: reference.text.len(),
        }));
    }

    if flags.sufval {
        check_sufval(bwt_seq, reference)?;
    }
    if flags.lfmapwalk {
        check_lfmapwalk(bwt_seq, reference)?;
    }
    if flags.context {
        check_context(bwt_seq, reference)?;
    }
    Ok(())
}

fn check_sufval(bwt_seq: &BwtSequence, reference: &Reference) -> Result<()> {
    let n = bwt_seq.sequence_length();

    let terminator_row = reference
        .suffix_array
        .iter()
        .position(|&sa| sa == 0)
        .expect("a suffix array over T$ always has exactly one row with sa == 0") as u64;
    let got_primary = bwt_seq.primary_index();
    if got_primary != terminator_row {
        return Err(Error::IntegrityMismatch(IntegrityError::TerminatorMismatch {
            got: got_primary as usize,
            expected: terminator_row as usize,
        }));
    }

    if !bwt_seq.has_locate() {
        return Err(Error::IntegrityMismatch(IntegrityError::NotReversible));
    }

    for bwt_pos in 0..n {
        let expected = reference.suffix_array[bwt_pos as usize];
        let got = bwt_seq.locate(bwt_pos)?;
        if got != expected {
            return Err(Error::IntegrityMismatch(IntegrityError::LocateMismatch {
                bwt_pos: bwt_pos as usize,
                got: got as usize,
                expected: expected as usize,
            }));
        }
    }
    Ok(())
}

/// `LFMAPWALK`: starting at the terminator row and applying `LF` *N-1*
/// times must reproduce `T` (without its terminator) in reverse.
fn check_lfmapwalk(bwt_seq: &BwtSequence, reference: &Reference) -> Result<()> {
    let n = reference.text.len() as u64;
    let mut row = bwt_seq.primary_index();

    for step in 0..n.saturating_sub(1) {
        row = bwt_seq.lf(row);
        let got = bwt_seq.get(row);
        let expected = reference.text[(n - step - 2) as usize];
        if got != expected {
            return Err(Error::IntegrityMismatch(IntegrityError::LfWalkMismatch {
                step: step as usize,
                got,
                expected,
            }));
        }
    }
    Ok(())
}

/// `CONTEXT`: slides a fixed-size window across the text (terminator
/// excluded) and checks `accessSubsequence` against the reference text.
fn check_context(bwt_seq: &BwtSequence, reference: &Reference) -> Result<()> {
    let text_len = reference.text.len().saturating_sub(1);
    if text_len == 0 {
        return Ok(());
    }

    let mut start = 0usize;
    while start < text_len {
        let len = CONTEXT_WINDOW.min(text_len - start);
        let mut out = vec![0u8; len];
        bwt_seq.access_subsequence(start as u64, len, &mut out)?;

        for (offset, (&got, &expected)) in out
            .iter()
            .zip(&reference.text[start..start + len])
            .enumerate()
        {
            if got != expected {
                return Err(Error::IntegrityMismatch(IntegrityError::ContextMismatch {
                    pos: start + offset,
                    got,
                    expected,
                }));
            }
        }
        start += len;
    }
    Ok(())
}

/// Maps a [`Result`] from [`run`] to the verifier CLI's process exit code:
/// `0` on success, a distinct non-zero code per failure category.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(Error::IntegrityMismatch(IntegrityError::LengthMismatch { .. })) => 1,
        Err(Error::IntegrityMismatch(IntegrityError::LocateMismatch { .. })) => 2,
        Err(Error::IntegrityMismatch(IntegrityError::TerminatorMismatch { .. })) => 3,
        Err(Error::IntegrityMismatch(IntegrityError::LfWalkMismatch { .. })) => 4,
        Err(Error::IntegrityMismatch(IntegrityError::ContextMismatch { .. })) => 5,
        Err(Error::IntegrityMismatch(IntegrityError::ContextMapLoadFailure { .. })) => 6,
        Err(Error::IntegrityMismatch(IntegrityError::NotReversible)) => 7,
        Err(Error::Io(_)) => 10,
        Err(Error::Configuration(_)) => 11,
        Err(Error::FormatCorruption(_)) => 12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{AlphabetPartition, RangeMode};
    use crate::config::Config;
    use crate::eis::builder::EisBuilder;
    use crate::eis::reader::EisReader;

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

    fn build(text: &str) -> (BwtSequence, Vec<u8>, Vec<u64>) {
        let alphabet =
            AlphabetPartition::new(&[(b"ACGT".to_vec(), RangeMode::BlockComposition)]).unwrap();
        let internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
        let mut full = internal;
        full.push(0);

        let (bwt, sa) = naive_bwt(&full);
        let n = bwt.len() as u64;

        let config = Config::new().block_size(2).blocks_per_bucket(2);
        let builder = EisBuilder::new(alphabet, config).unwrap();
        let built = builder.build(bwt.into_iter(), n).unwrap();
        let reader = EisReader::from_bytes(built.bytes).unwrap();

        let sa_u64: Vec<u64> = sa.iter().map(|&v| v as u64).collect();
        let bwt_seq = BwtSequence::wrap_with_locate(reader, sa_u64.clone(), 2, Some(1)).unwrap();
        (bwt_seq, full, sa_u64)
    }

    #[test]
    fn clean_index_passes_every_check() {
        let (bwt_seq, text, sa) = build("ACGTACGTACGT");
        let reference = Reference {
            suffix_array: &sa,
            text: &text,
        };
        let result = run(&bwt_seq, &reference, VerifyFlags::all());
        assert!(result.is_ok());
        assert_eq!(exit_code(&result), 0);
    }

    #[test]
    fn tampered_suffix_array_is_caught_by_sufval() {
        let (bwt_seq, text, mut sa) = build("ACGTACGTACGT");
        sa[3] = (sa[3] + 1) % text.len() as u64;
        let reference = Reference {
            suffix_array: &sa,
            text: &text,
        };
        let result = run(&bwt_seq, &reference, VerifyFlags::all());
        assert!(matches!(
            result,
            Err(Error::IntegrityMismatch(IntegrityError::LocateMismatch { .. }))
        ));
        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn mismatched_reference_text_length_is_rejected() {
        let (bwt_seq, _text, sa) = build("ACGTACGT");
        let short_text = vec![1u8; 3];
        let reference = Reference {
            suffix_array: &sa,
            text: &short_text,
        };
        let result = run(&bwt_seq, &reference, VerifyFlags::all());
        assert!(matches!(
            result,
            Err(Error::IntegrityMismatch(IntegrityError::LengthMismatch { .. }))
        ));
        assert_eq!(exit_code(&result), 1);
    }

    #[test]
    fn context_only_flag_skips_sufval_and_lfmapwalk() {
        let (bwt_seq, text, sa) = build("ACGTACGTACGT");
        let reference = Reference {
            suffix_array: &sa,
            text: &text,
        };
        let flags = VerifyFlags {
            sufval: false,
            lfmapwalk: false,
            context: true,
        };
        assert!(run(&bwt_seq, &reference, flags).is_ok());
    }
}
