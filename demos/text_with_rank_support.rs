use fmeis::alphabet::ascii_dna;
use fmeis::{Config, EisBuilder, EisReader};
use fmeis::eis::Hint;

fn main() {
    // This example shows how to use the block-compressed EIS directly,
    // the rank/access structure that powers the rest of the index. It
    // assumes the input is already a stream of internal symbol ids.

    let alphabet = ascii_dna().unwrap();
    let symbols: Vec<u8> = "AAACCCGGGTTT"
        .bytes()
        .map(|c| alphabet.map(c).unwrap())
        .collect();
    let n = symbols.len() as u64;

    let config = Config::new().block_size(4).blocks_per_bucket(2);
    let builder = EisBuilder::new(alphabet.clone(), config).unwrap();
    let built = builder.build(symbols.into_iter(), n).unwrap();
    let reader = EisReader::from_bytes(built.bytes).unwrap();

    let mut hint = Hint::default();
    let idx = 4;
    let symbol = alphabet.map(b'C').unwrap();

    // characters from the text can be recovered directly
    assert_eq!(reader.get(idx, &mut hint), symbol);

    // rank(sym, pos) is the number of occurrences of sym in [0, pos)
    assert_eq!(reader.rank(symbol, idx, &mut hint), 1);
}
