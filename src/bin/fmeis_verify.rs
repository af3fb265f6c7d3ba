//! `fmeis-verify`: an independent checker that re-loads a reference
//! suffix array and replays `locate`, the `LF`-walk, and context
//! retrieval against a built `.bdx` index, exiting with a distinct
//! non-zero code on the first detected discrepancy.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use fmeis::eis::EisReader;
use fmeis::verify::{self, Reference, VerifyFlags};
use fmeis::BwtSequence;

/// Replays locate, the LF-walk, and context retrieval against an
/// independently supplied reference suffix array and text.
#[derive(Debug, Parser)]
#[command(name = "fmeis-verify", version, about)]
struct Args {
    /// Path to the `.bdx` index to verify.
    #[arg(long)]
    index: PathBuf,

    /// Path to the reference suffix array: `n` native-endian `u64`
    /// values, `suffix_array[i]` giving the text position of BWT row `i`.
    #[arg(long)]
    suffix_array: PathBuf,

    /// Path to the reference text, internal symbol ids already applied,
    /// with the terminator (internal id `0`) appended.
    #[arg(long)]
    text: PathBuf,

    /// Every k-th BWT position carries a sampled text offset; other
    /// positions are reached by walking `LF` until a marked one.
    #[arg(long, default_value_t = 8)]
    locate_stride: u64,

    /// `mapIntervalLog2` for the context retriever; omit to autosize.
    #[arg(long)]
    map_interval_log2: Option<u32>,

    /// Skip the SUFVAL check (locate agreement against the reference SA).
    #[arg(long)]
    no_sufval: bool,

    /// Skip the LFMAPWALK check (terminator -> LF * N -> reversed text).
    #[arg(long)]
    no_lfmapwalk: bool,

    /// Skip the CONTEXT check (accessSubsequence against reference text).
    #[arg(long)]
    no_context: bool,
}

fn read_u64_native(path: &std::path::Path) -> std::io::Result<Vec<u64>> {
    let bytes = std::fs::read(path)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_ne_bytes(c.try_into().unwrap()))
        .collect())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let reader = match EisReader::open(&args.index) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to open index {:?}: {e}", args.index);
            return ExitCode::from(10);
        }
    };

    let suffix_array = match read_u64_native(&args.suffix_array) {
        Ok(sa) => sa,
        Err(e) => {
            eprintln!("failed to read suffix array {:?}: {e}", args.suffix_array);
            return ExitCode::from(10);
        }
    };

    let text = match std::fs::read(&args.text) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to read reference text {:?}: {e}", args.text);
            return ExitCode::from(10);
        }
    };

    info!(n = suffix_array.len(), "loaded reference suffix array");

    let bwt_seq = match BwtSequence::wrap_with_locate(
        reader,
        suffix_array.clone(),
        args.locate_stride,
        args.map_interval_log2,
    ) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to wrap index with locate support: {e}");
            return ExitCode::from(11);
        }
    };

    let flags = VerifyFlags {
        sufval: !args.no_sufval,
        lfmapwalk: !args.no_lfmapwalk,
        context: !args.no_context,
    };

    let reference = Reference {
        suffix_array: &suffix_array,
        text: &text,
    };

    let result = verify::run(&bwt_seq, &reference, flags);
    match &result {
        Ok(()) => info!("verification passed: index agrees with reference suffix array"),
        Err(e) => eprintln!("verification failed: {e}"),
    }

    ExitCode::from(verify::exit_code(&result) as u8)
}
