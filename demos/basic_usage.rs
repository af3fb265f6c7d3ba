use fmeis::alphabet::ascii_dna;
use fmeis::{BwtSequence, Config, EisBuilder, EisReader};

/// Naively builds the BWT and suffix array of `text_with_terminator` by
/// sorting all rotations; good enough for a small demo text. Suffix-array
/// construction itself is out of scope for this crate, which only consumes
/// the BWT and suffix array as streams from an external producer.
fn naive_bwt(text_with_terminator: &[u8]) -> (Vec<u8>, Vec<u64>) {
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
    (bwt, sa.into_iter().map(|i| i as u64).collect())
}

fn main() {
    // This example shows how to build a block-compressed index from a BWT
    // stream and run count/locate queries against it.
    let alphabet = ascii_dna().unwrap();
    let text = "CCCAAAGGGTTT";
    let mut internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
    internal.push(0); // terminator

    let (bwt, sa) = naive_bwt(&internal);
    let n = bwt.len() as u64;

    let config = Config::new().block_size(4).blocks_per_bucket(4);
    let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
    let built = builder.build(bwt.into_iter(), n).unwrap();
    let reader = EisReader::from_bytes(built.bytes).unwrap();
    let index = BwtSequence::wrap_with_locate(reader, sa, 2, Some(1)).unwrap();

    let query: Vec<u8> = "GG".bytes().map(|c| alphabet.map(c).unwrap()).collect();
    let (l, r) = index.match_bounds(&query);
    assert_eq!(r - l, 2);

    for position in index.exact_match_iterator(&query, true).unwrap() {
        println!("Found query at text position {position}.");
    }

    // accessSubsequence reconstructs any window of the original text
    // purely from the index, without keeping the text around.
    let mut window = vec![0u8; 3];
    index.access_subsequence(6, 3, &mut window).unwrap();
    let expected: Vec<u8> = "GGG".bytes().map(|c| alphabet.map(c).unwrap()).collect();
    assert_eq!(window, expected);
}
