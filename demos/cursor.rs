use fmeis::alphabet::ascii_dna;
use fmeis::{BwtSequence, Config, EisBuilder, EisReader};

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
    // This example shows `match_bounds` narrowing as symbols are prepended
    // to the front of a query, the same backward-search mechanics a
    // stateful cursor would wrap.
    let alphabet = ascii_dna().unwrap();
    let text = "GTGTGTGTGTGT";
    let mut internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
    internal.push(0);

    let (bwt, sa) = naive_bwt(&internal);
    let n = bwt.len() as u64;

    let config = Config::new().block_size(4).blocks_per_bucket(4);
    let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
    let built = builder.build(bwt.into_iter(), n).unwrap();
    let reader = EisReader::from_bytes(built.bytes).unwrap();
    let index = BwtSequence::wrap_with_locate(reader, sa, 2, Some(1)).unwrap();

    let map = |s: &str| -> Vec<u8> { s.bytes().map(|c| alphabet.map(c).unwrap()).collect() };

    // There are too many occurrences of "GT" for our taste.
    let (l, r) = index.match_bounds(&map("GT"));
    assert_eq!(r - l, 6);

    // Prepending a symbol to the front of the query narrows the match the
    // same way `extend_query_front` would on a stateful cursor.
    let (l, r) = index.match_bounds(&map("TGT"));
    assert_eq!(r - l, 5);

    for position in index.exact_match_iterator(&map("TGT"), true).unwrap() {
        println!("Found query at text position {position}.");
    }
}
