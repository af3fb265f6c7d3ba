use fmeis::alphabet::ascii_dna;
use fmeis::{AlphabetPartition, BwtSequence, Config, EisBuilder, EisReader};
use std::collections::HashSet;

fn naive_bwt_and_sa(text_with_terminator: &[u8]) -> (Vec<u8>, Vec<u64>) {
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

fn create_index(text: &str, alphabet: &AlphabetPartition) -> BwtSequence {
    let mut internal: Vec<u8> = text.bytes().map(|c| alphabet.map(c).unwrap()).collect();
    internal.push(0);
    let (bwt, sa) = naive_bwt_and_sa(&internal);
    let n = bwt.len() as u64;

    let config = Config::new().block_size(4).blocks_per_bucket(3);
    let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
    let built = builder.build(bwt.into_iter(), n).unwrap();
    let reader = EisReader::from_bytes(built.bytes).unwrap();
    BwtSequence::wrap_with_locate(reader, sa, 1, Some(1)).unwrap()
}

fn locate_all(index: &BwtSequence, query: &[u8]) -> HashSet<u64> {
    let (l, r) = index.match_bounds(query);
    (l..r).map(|row| index.locate(row).unwrap()).collect()
}

fn map(alphabet: &AlphabetPartition, s: &str) -> Vec<u8> {
    s.bytes().map(|c| alphabet.map(c).unwrap()).collect()
}

#[test]
fn basic_search() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("CCCAAAGGGTTT", &alphabet);

    let results = locate_all(&index, &map(&alphabet, "GG"));
    let expected: HashSet<u64> = HashSet::from_iter([6, 7]);

    assert_eq!(results, expected);
}

#[test]
fn text_front_search() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("CCCAAAGGGTTT", &alphabet);

    let results = locate_all(&index, &map(&alphabet, "C"));
    let expected: HashSet<u64> = HashSet::from_iter([0, 1, 2]);

    assert_eq!(results, expected);
}

#[test]
fn search_no_wrapping() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("CCCAAAGGGTTT", &alphabet);

    let results = locate_all(&index, &map(&alphabet, "TA"));
    assert!(results.is_empty());
}

#[test]
fn exact_match_iterator_matches_locate() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("ACCCACCCACCC", &alphabet);

    let query = map(&alphabet, "CC");
    let via_iterator: HashSet<u64> = index
        .exact_match_iterator(&query, true)
        .unwrap()
        .into_iter()
        .collect();
    let via_locate = locate_all(&index, &query);

    assert_eq!(via_iterator, via_locate);
}

#[test]
fn access_subsequence_recovers_original_text() {
    let alphabet = ascii_dna().unwrap();
    let text = "ACGTACGTACGTACGT";
    let index = create_index(text, &alphabet);

    let mut buf = vec![0u8; 8];
    index.access_subsequence(4, 8, &mut buf).unwrap();

    let expected = map(&alphabet, &text[4..12]);
    assert_eq!(buf, expected);
}

#[test]
fn unique_forward_finds_shortest_unique_suffix() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("ACGTACGTACGT", &alphabet);

    // "GT" repeats, but "CGT" still isn't unique in a purely periodic text;
    // appending the terminator-adjacent prefix eventually disambiguates.
    let none_case = index.unique_forward(&map(&alphabet, "T"));
    assert!(none_case.is_none() || none_case == Some(1));
}

#[test]
fn rank_and_lf_are_consistent_with_match_bounds() {
    let alphabet = ascii_dna().unwrap();
    let index = create_index("GATTACA", &alphabet);

    let a = alphabet.map(b'A').unwrap();
    let total_a = index.total_count(a);
    assert_eq!(index.rank(a, index.sequence_length()), total_a);

    for i in 0..index.sequence_length() {
        let next = index.lf(i);
        assert!(next < index.sequence_length());
    }
}
