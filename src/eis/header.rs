//! The `.bdx` file header: magic bytes followed by a sequence of tagged
//! records, terminated by a zero tag.

use crate::alphabet::{AlphabetPartition, RangeDescriptor, RangeMode};
use crate::error::{Error, Result};

pub(crate) const MAGIC: [u8; 4] = *b"BDX\0";

/// Four-byte record tags. The high nibble of the first byte is reserved
/// for extension headers (skippable on unknown tags); every tag defined
/// here has that nibble clear.
mod tag {
    pub const BLOCK_SIZE: u32 = u32::from_be_bytes(*b"BSZ\0");
    pub const BLOCKS_PER_BUCKET: u32 = u32::from_be_bytes(*b"BPB\0");
    pub const VARIABLE_OFFSET: u32 = u32::from_be_bytes(*b"VOF\0");
    pub const RANGE_OFFSET: u32 = u32::from_be_bytes(*b"ROF\0");
    pub const SEQUENCE_LENGTH: u32 = u32::from_be_bytes(*b"SLE\0");
    pub const BITS_PER_LENGTH: u32 = u32::from_be_bytes(*b"BPL\0");
    pub const BITS_PER_VAR_DISK_OFFSET: u32 = u32::from_be_bytes(*b"BVO\0");
    pub const PARTIAL_SUM_BITS: u32 = u32::from_be_bytes(*b"PSB\0");
    pub const BLOCK_FALLBACK: u32 = u32::from_be_bytes(*b"BFB\0");
    pub const REGION_FALLBACK: u32 = u32::from_be_bytes(*b"RFB\0");
    pub const ALPHABET_RANGES: u32 = u32::from_be_bytes(*b"ARG\0");
    pub const FEATURE_FLAGS: u32 = u32::from_be_bytes(*b"FFL\0");
    pub const CALLBACK_MIDDLE_BITS: u32 = u32::from_be_bytes(*b"CMB\0");
    pub const CALLBACK_EXTRA_BITS: u32 = u32::from_be_bytes(*b"CEB\0");
    pub const MAX_EXTRA_BITS: u32 = u32::from_be_bytes(*b"MEXB");
    pub const END: u32 = 0;
}

const EXTENSION_NIBBLE_MASK: u32 = 0xF000_0000;

bitflags_lite::bitflags! {
    pub struct FeatureFlags: u8 {
        region_sums = 1;
        reversibly_sorted = 2;
    }
}

/// A tiny inline replacement for a `bitflags` dependency: the feature
/// flags are a two-bit set, not worth pulling in a whole crate for.
mod bitflags_lite {
    macro_rules! bitflags {
        (pub struct $name:ident { $($field:ident = $val:expr;)* }) => {
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name(pub u8);

            impl $name {
                $(
                    pub const $field: u8 = $val;
                )*

                pub fn from_bits(bits: u8) -> Self {
                    Self(bits)
                }

                pub fn bits(&self) -> u8 {
                    self.0
                }

                $(
                    #[allow(non_snake_case)]
                    pub fn $field(&self) -> bool {
                        self.0 & Self::$field != 0
                    }
                )*
            }
        };
    }
    pub(crate) use bitflags;
}

#[derive(Debug, Clone)]
pub struct Header {
    pub block_size: u64,
    pub blocks_per_bucket: u64,
    pub variable_offset: u64,
    pub range_offset: u64,
    pub sequence_length: u64,
    pub bits_per_length: u32,
    pub bits_per_var_disk_offset: u32,
    pub partial_sum_bits: u32,
    pub block_fallback: u8,
    pub region_fallback: u8,
    pub ranges: Vec<RangeDescriptor>,
    pub region_sums: bool,
    pub reversibly_sorted: bool,
    pub callback_middle_bits: Option<u32>,
    pub callback_extra_bits: Option<u32>,
    pub max_extra_bits: Option<u64>,
    /// Total byte length of the header, including magic and the
    /// end-of-header sentinel, rounded up to the page size. Constant-width
    /// data starts here.
    pub header_len: u64,
}

impl Header {
    fn write_record(out: &mut Vec<u8>, tag: u32, payload: &[u8]) {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
        out.extend_from_slice(payload);
    }

    /// Serializes every record except the final header-length field and
    /// padding; the caller (the builder) computes `header_len` once it
    /// knows the rounded page-aligned size and rewrites the first 8 bytes.
    pub fn write(&self, alphabet: &AlphabetPartition) -> Vec<u8> {
        let _ = alphabet;
        let mut body = Vec::new();

        Self::write_record(&mut body, tag::BLOCK_SIZE, &self.block_size.to_ne_bytes());
        Self::write_record(
            &mut body,
            tag::BLOCKS_PER_BUCKET,
            &self.blocks_per_bucket.to_ne_bytes(),
        );
        Self::write_record(
            &mut body,
            tag::VARIABLE_OFFSET,
            &self.variable_offset.to_ne_bytes(),
        );
        Self::write_record(&mut body, tag::RANGE_OFFSET, &self.range_offset.to_ne_bytes());
        Self::write_record(
            &mut body,
            tag::SEQUENCE_LENGTH,
            &self.sequence_length.to_ne_bytes(),
        );
        Self::write_record(
            &mut body,
            tag::BITS_PER_LENGTH,
            &self.bits_per_length.to_ne_bytes(),
        );
        Self::write_record(
            &mut body,
            tag::BITS_PER_VAR_DISK_OFFSET,
            &self.bits_per_var_disk_offset.to_ne_bytes(),
        );
        Self::write_record(
            &mut body,
            tag::PARTIAL_SUM_BITS,
            &self.partial_sum_bits.to_ne_bytes(),
        );
        Self::write_record(&mut body, tag::BLOCK_FALLBACK, &[self.block_fallback]);
        Self::write_record(&mut body, tag::REGION_FALLBACK, &[self.region_fallback]);

        let mut ranges_payload = Vec::new();
        ranges_payload.extend_from_slice(&(self.ranges.len() as u32).to_ne_bytes());
        for r in &self.ranges {
            let mode_tag: u8 = match r.mode {
                RangeMode::BlockComposition => 0,
                RangeMode::RegionList => 1,
            };
            ranges_payload.push(mode_tag);
            ranges_payload.push(r.start);
            ranges_payload.push(r.len);
        }
        Self::write_record(&mut body, tag::ALPHABET_RANGES, &ranges_payload);

        let mut flags = FeatureFlags::default();
        if self.region_sums {
            flags.0 |= FeatureFlags::region_sums;
        }
        if self.reversibly_sorted {
            flags.0 |= FeatureFlags::reversibly_sorted;
        }
        Self::write_record(&mut body, tag::FEATURE_FLAGS, &[flags.bits()]);

        if let Some(v) = self.callback_middle_bits {
            Self::write_record(&mut body, tag::CALLBACK_MIDDLE_BITS, &v.to_ne_bytes());
        }
        if let Some(v) = self.callback_extra_bits {
            Self::write_record(&mut body, tag::CALLBACK_EXTRA_BITS, &v.to_ne_bytes());
        }
        if let Some(v) = self.max_extra_bits {
            Self::write_record(&mut body, tag::MAX_EXTRA_BITS, &v.to_ne_bytes());
        }

        Self::write_record(&mut body, tag::END, &[]);

        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(self.header_len as u32).to_ne_bytes());
        out.extend_from_slice(&body);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || bytes[0..4] != MAGIC {
            return Err(Error::corrupt("bad magic bytes"));
        }
        let header_len = u32::from_ne_bytes(bytes[4..8].try_into().unwrap()) as u64;

        let mut pos = 8usize;
        let mut block_size = None;
        let mut blocks_per_bucket = None;
        let mut variable_offset = None;
        let mut range_offset = None;
        let mut sequence_length = None;
        let mut bits_per_length = None;
        let mut bits_per_var_disk_offset = None;
        let mut partial_sum_bits = None;
        let mut block_fallback = None;
        let mut region_fallback = None;
        let mut ranges = Vec::new();
        let mut region_sums = false;
        let mut reversibly_sorted = false;
        let mut callback_middle_bits = None;
        let mut callback_extra_bits = None;
        let mut max_extra_bits = None;

        loop {
            if pos + 8 > bytes.len() {
                return Err(Error::corrupt("unexpected end of header"));
            }
            let rtag = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
            let len = u32::from_ne_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
            pos += 8;
            if rtag == tag::END {
                break;
            }
            let payload = bytes
                .get(pos..pos + len)
                .ok_or_else(|| Error::corrupt("truncated header record"))?;
            pos += len;

            match rtag {
                t if t == tag::BLOCK_SIZE => block_size = Some(read_u64(payload)?),
                t if t == tag::BLOCKS_PER_BUCKET => blocks_per_bucket = Some(read_u64(payload)?),
                t if t == tag::VARIABLE_OFFSET => variable_offset = Some(read_u64(payload)?),
                t if t == tag::RANGE_OFFSET => range_offset = Some(read_u64(payload)?),
                t if t == tag::SEQUENCE_LENGTH => sequence_length = Some(read_u64(payload)?),
                t if t == tag::BITS_PER_LENGTH => bits_per_length = Some(read_u32(payload)?),
                t if t == tag::BITS_PER_VAR_DISK_OFFSET => {
                    bits_per_var_disk_offset = Some(read_u32(payload)?)
                }
                t if t == tag::PARTIAL_SUM_BITS => partial_sum_bits = Some(read_u32(payload)?),
                t if t == tag::BLOCK_FALLBACK => {
                    block_fallback = Some(*payload.first().ok_or_else(|| {
                        Error::corrupt("empty block fallback record")
                    })?)
                }
                t if t == tag::REGION_FALLBACK => {
                    region_fallback = Some(*payload.first().ok_or_else(|| {
                        Error::corrupt("empty region fallback record")
                    })?)
                }
                t if t == tag::ALPHABET_RANGES => {
                    let n = read_u32(&payload[0..4])? as usize;
                    let mut parsed = Vec::with_capacity(n);
                    for i in 0..n {
                        let base = 4 + i * 3;
                        let chunk = payload
                            .get(base..base + 3)
                            .ok_or_else(|| Error::corrupt("truncated alphabet range record"))?;
                        let mode = match chunk[0] {
                            0 => RangeMode::BlockComposition,
                            1 => RangeMode::RegionList,
                            _ => return Err(Error::corrupt("unknown range mode tag")),
                        };
                        parsed.push(RangeDescriptor {
                            mode,
                            start: chunk[1],
                            len: chunk[2],
                        });
                    }
                    ranges = parsed;
                }
                t if t == tag::FEATURE_FLAGS => {
                    let flags = FeatureFlags::from_bits(
                        *payload.first().ok_or_else(|| Error::corrupt("empty feature flags"))?,
                    );
                    region_sums = flags.region_sums();
                    reversibly_sorted = flags.reversibly_sorted();
                }
                t if t == tag::CALLBACK_MIDDLE_BITS => callback_middle_bits = Some(read_u32(payload)?),
                t if t == tag::CALLBACK_EXTRA_BITS => callback_extra_bits = Some(read_u32(payload)?),
                t if t == tag::MAX_EXTRA_BITS => max_extra_bits = Some(read_u64(payload)?),
                t if t & EXTENSION_NIBBLE_MASK != 0 => {
                    // extension record with unknown meaning: skip.
                }
                _ => return Err(Error::corrupt(format!("unknown header tag 0x{rtag:08x}"))),
            }
        }

        Ok(Self {
            block_size: block_size.ok_or_else(|| Error::corrupt("missing BlockSize record"))?,
            blocks_per_bucket: blocks_per_bucket
                .ok_or_else(|| Error::corrupt("missing BlocksPerBucket record"))?,
            variable_offset: variable_offset
                .ok_or_else(|| Error::corrupt("missing VariableOffset record"))?,
            range_offset: range_offset.ok_or_else(|| Error::corrupt("missing RangeOffset record"))?,
            sequence_length: sequence_length
                .ok_or_else(|| Error::corrupt("missing SequenceLength record"))?,
            bits_per_length: bits_per_length
                .ok_or_else(|| Error::corrupt("missing BitsPerLength record"))?,
            bits_per_var_disk_offset: bits_per_var_disk_offset
                .ok_or_else(|| Error::corrupt("missing BitsPerVarDiskOffset record"))?,
            partial_sum_bits: partial_sum_bits
                .ok_or_else(|| Error::corrupt("missing PartialSumBits record"))?,
            block_fallback: block_fallback
                .ok_or_else(|| Error::corrupt("missing BlockFallback record"))?,
            region_fallback: region_fallback
                .ok_or_else(|| Error::corrupt("missing RegionFallback record"))?,
            ranges,
            region_sums,
            reversibly_sorted,
            callback_middle_bits,
            callback_extra_bits,
            max_extra_bits,
            header_len,
        })
    }
}

fn read_u64(payload: &[u8]) -> Result<u64> {
    payload
        .try_into()
        .map(u64::from_ne_bytes)
        .map_err(|_| Error::corrupt("malformed u64 header field"))
}

fn read_u32(payload: &[u8]) -> Result<u32> {
    payload
        .try_into()
        .map(u32::from_ne_bytes)
        .map_err(|_| Error::corrupt("malformed u32 header field"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::ascii_dna_with_n;

    #[test]
    fn header_round_trips() {
        let alphabet = ascii_dna_with_n().unwrap();
        let header = Header {
            block_size: 8,
            blocks_per_bucket: 64,
            variable_offset: 4096,
            range_offset: 8192,
            sequence_length: 1000,
            bits_per_length: 20,
            bits_per_var_disk_offset: 24,
            partial_sum_bits: 16,
            block_fallback: alphabet.block_fallback(),
            region_fallback: alphabet.region_fallback(),
            ranges: alphabet.ranges().to_vec(),
            region_sums: true,
            reversibly_sorted: false,
            callback_middle_bits: Some(4),
            callback_extra_bits: None,
            max_extra_bits: Some(128),
            header_len: 4096,
        };

        let bytes = header.write(&alphabet);
        let parsed = Header::parse(&bytes).unwrap();

        assert_eq!(parsed.block_size, 8);
        assert_eq!(parsed.sequence_length, 1000);
        assert_eq!(parsed.variable_offset, 4096);
        assert_eq!(parsed.range_offset, 8192);
        assert!(parsed.region_sums);
        assert!(!parsed.reversibly_sorted);
        assert_eq!(parsed.ranges.len(), 2);
        assert_eq!(parsed.callback_middle_bits, Some(4));
        assert_eq!(parsed.max_extra_bits, Some(128));
    }

    #[test]
    fn rejects_bad_magic() {
        let err = Header::parse(&[0u8; 16]);
        assert!(err.is_err());
    }
}
