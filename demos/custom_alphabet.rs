use fmeis::alphabet::{AlphabetPartition, RangeMode};

fn main() {
    // This example shows how to build a custom multi-range alphabet: some
    // symbols are folded densely into the block encoding, others are
    // stored sparsely as range-list runs. Internal symbol 0 is always the
    // reserved terminator, so every alphabet's size is one larger than the
    // number of symbols supplied here.

    let digits = AlphabetPartition::new(&[(b"0123456789".to_vec(), RangeMode::BlockComposition)])
        .unwrap();
    assert_eq!(digits.size(), 11);
    assert_eq!(digits.num_dense_symbols(), 10);

    // A DNA alphabet where the four common bases are dense and the rare
    // ambiguity code `N` is handled by the sparse range list instead of
    // taking up a slot in every block's composition.
    let dna_with_n = AlphabetPartition::new(&[
        (b"ACGT".to_vec(), RangeMode::BlockComposition),
        (b"N".to_vec(), RangeMode::RegionList),
    ])
    .unwrap();
    assert_eq!(dna_with_n.size(), 6); // terminator + ACGT + N
    assert_eq!(dna_with_n.num_dense_symbols(), 4);

    let n = dna_with_n.map(b'N').unwrap();
    assert_eq!(dna_with_n.mode_of(n), Some(RangeMode::RegionList));

    // The dense secondary alphabet collapses every RegionList symbol into
    // one shared fallback slot, which is what the block encoder actually
    // sees.
    let secondary = dna_with_n.dense_secondary_mapping().unwrap();
    assert_eq!(secondary.size(), 5); // A, C, G, T, fallback
    assert_eq!(secondary.map(n), secondary.fallback());
}
