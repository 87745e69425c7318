use thiserror::Error;

use crate::catalog::{ByteOrder, SignalDescriptor};

/// Widest signal the codec can carry.
pub const MAX_BIT_LENGTH: u8 = 64;

/// Errors returned when a signal does not fit a payload.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LayoutError {
    /// The signal width is zero or wider than 64 bits.
    #[error("signal `{signal}` has invalid bit length {bit_length}; expected 1..=64")]
    InvalidBitLength { signal: String, bit_length: u8 },
    /// The signal's bit range runs past the end of the payload.
    #[error(
        "signal `{signal}` ({bit_length} bits from bit {start_bit}) does not fit a {payload_len}-byte payload"
    )]
    OutOfBounds {
        signal: String,
        start_bit: u16,
        bit_length: u8,
        payload_len: usize,
    },
}

/// A run of bits inside one payload byte.
///
/// `num_bits` bits starting at `bit_offset` in `payload[byte_index]` land at
/// `value_shift` in the raw value.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct BitSpan {
    byte_index: usize,
    bit_offset: u8,
    num_bits: u8,
    value_shift: u8,
}

impl BitSpan {
    fn mask(self) -> u8 {
        // num_bits is 1..=8
        (((1_u16) << self.num_bits) - 1) as u8
    }
}

/// Byte/bit positions occupied by one signal.
///
/// Extraction and packing walk the same spans, so they are inverses.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SignalLayout {
    spans: Vec<BitSpan>,
    bit_length: u8,
}

impl SignalLayout {
    /// Computes the spans of `signal` and checks them against `payload_len`.
    pub(crate) fn new(signal: &SignalDescriptor, payload_len: usize) -> Result<Self, LayoutError> {
        let bit_length = signal.bit_length();
        if bit_length == 0 || bit_length > MAX_BIT_LENGTH {
            return Err(LayoutError::InvalidBitLength {
                signal: signal.name().to_string(),
                bit_length,
            });
        }

        let spans = match signal.byte_order() {
            ByteOrder::LittleEndian => little_endian_spans(signal.start_bit(), bit_length),
            ByteOrder::BigEndian => big_endian_spans(signal.start_bit(), bit_length),
        };
        let layout = Self { spans, bit_length };
        layout.check_fits(signal, payload_len)?;
        Ok(layout)
    }

    /// Checks that every byte this signal touches exists in a `payload_len`-byte payload.
    pub(crate) fn check_fits(
        &self,
        signal: &SignalDescriptor,
        payload_len: usize,
    ) -> Result<(), LayoutError> {
        if self.spans.iter().all(|span| span.byte_index < payload_len) {
            return Ok(());
        }
        Err(LayoutError::OutOfBounds {
            signal: signal.name().to_string(),
            start_bit: signal.start_bit(),
            bit_length: self.bit_length,
            payload_len,
        })
    }

    pub(crate) fn bit_length(&self) -> u8 {
        self.bit_length
    }

    /// Returns the flat payload bit indices (`byte * 8 + bit`) this signal occupies.
    pub(crate) fn occupied_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.spans.iter().flat_map(|span| {
            let first = span.byte_index * 8 + usize::from(span.bit_offset);
            first..first + usize::from(span.num_bits)
        })
    }

    /// Reads the raw unsigned value from `payload`.
    pub(crate) fn extract(&self, payload: &[u8]) -> u64 {
        self.spans.iter().fold(0_u64, |raw, span| {
            let bits = (payload[span.byte_index] >> span.bit_offset) & span.mask();
            raw | (u64::from(bits) << span.value_shift)
        })
    }

    /// Writes the low `bit_length` bits of `raw` into `payload`.
    ///
    /// Bits outside the signal's spans are left untouched.
    pub(crate) fn pack(&self, payload: &mut [u8], raw: u64) {
        for span in &self.spans {
            let mask = span.mask();
            let bits = ((raw >> span.value_shift) as u8) & mask;
            payload[span.byte_index] &= !(mask << span.bit_offset);
            payload[span.byte_index] |= bits << span.bit_offset;
        }
    }
}

fn little_endian_spans(start_bit: u16, bit_length: u8) -> Vec<BitSpan> {
    let mut spans = Vec::with_capacity(9);
    let mut byte_index = usize::from(start_bit / 8);
    let mut bit_index = (start_bit % 8) as u8;
    let mut remaining = bit_length;
    let mut value_shift = 0_u8;

    while remaining > 0 {
        let num_bits = (8 - bit_index).min(remaining);
        spans.push(BitSpan {
            byte_index,
            bit_offset: bit_index,
            num_bits,
            value_shift,
        });
        value_shift += num_bits;
        remaining -= num_bits;
        byte_index += 1;
        bit_index = 0;
    }
    spans
}

fn big_endian_spans(start_bit: u16, bit_length: u8) -> Vec<BitSpan> {
    let mut spans = Vec::with_capacity(9);
    let mut byte_index = usize::from(start_bit / 8);
    let mut bit_index = (start_bit % 8) as u8;
    let mut remaining = bit_length;

    // start_bit is the MSB; walk down inside each byte, then resume at bit 7.
    while remaining > 0 {
        let num_bits = (bit_index + 1).min(remaining);
        remaining -= num_bits;
        spans.push(BitSpan {
            byte_index,
            bit_offset: bit_index + 1 - num_bits,
            num_bits,
            value_shift: remaining,
        });
        byte_index += 1;
        bit_index = 7;
    }
    spans
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn signal(start_bit: u16, bit_length: u8, byte_order: ByteOrder) -> SignalDescriptor {
        SignalDescriptor::builder()
            .name("sample")
            .start_bit(start_bit)
            .bit_length(bit_length)
            .byte_order(byte_order)
            .build()
    }

    fn layout(start_bit: u16, bit_length: u8, byte_order: ByteOrder) -> SignalLayout {
        SignalLayout::new(&signal(start_bit, bit_length, byte_order), 8)
            .expect("sample signal should fit an 8-byte payload")
    }

    #[test]
    fn little_endian_crosses_byte_boundary() {
        let payload = [0b1010_0000, 0b0000_0011, 0, 0, 0, 0, 0, 0];
        // bits 5..=9 -> 0b11_101
        assert_eq!(0b11101, layout(5, 5, ByteOrder::LittleEndian).extract(&payload));
    }

    #[test]
    fn little_endian_full_width_reads_whole_payload() {
        let payload = [0x88, 0x77, 0x66, 0xFF, 0x44, 0x33, 0x22, 0x11];
        assert_eq!(
            0x1122_3344_FF66_7788,
            layout(0, 64, ByteOrder::LittleEndian).extract(&payload)
        );
    }

    // DBC "motohawk" example frame A5 B6 D9 ..
    #[rstest]
    #[case::temperature(0, 12, 0xDB6)]
    #[case::average_radius(6, 6, 18)]
    #[case::enable(7, 1, 1)]
    fn big_endian_matches_reference_frame(
        #[case] start_bit: u16,
        #[case] bit_length: u8,
        #[case] expected: u64,
    ) {
        let payload = [0xA5, 0xB6, 0xD9, 0, 0, 0, 0, 0];
        assert_eq!(
            expected,
            layout(start_bit, bit_length, ByteOrder::BigEndian).extract(&payload)
        );
    }

    #[test]
    fn big_endian_pack_reproduces_reference_bytes() {
        let mut payload = [0_u8; 8];
        layout(0, 12, ByteOrder::BigEndian).pack(&mut payload, 0xDB6);
        layout(6, 6, ByteOrder::BigEndian).pack(&mut payload, 18);
        layout(7, 1, ByteOrder::BigEndian).pack(&mut payload, 1);
        assert_eq!([0xA5, 0xB6, 0xC0, 0, 0, 0, 0, 0], payload);
    }

    #[test]
    fn big_endian_full_width_reads_whole_payload() {
        let payload = [0x80, 0, 0, 0, 0, 0, 0, 0x01];
        assert_eq!(
            0x8000_0000_0000_0001,
            layout(7, 64, ByteOrder::BigEndian).extract(&payload)
        );
    }

    #[test]
    fn pack_preserves_neighbouring_bits() {
        let mut payload = [0xFF_u8; 8];
        layout(4, 8, ByteOrder::LittleEndian).pack(&mut payload, 0);
        assert_eq!([0x0F, 0xF0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], payload);
    }

    #[test]
    fn occupied_bits_lists_flat_positions() {
        let bits: Vec<usize> = layout(6, 4, ByteOrder::LittleEndian)
            .occupied_bits()
            .collect();
        assert_eq!(vec![6, 7, 8, 9], bits);

        let bits: Vec<usize> = layout(1, 4, ByteOrder::BigEndian).occupied_bits().collect();
        assert_eq!(vec![0, 1, 14, 15], bits);
    }

    #[rstest]
    #[case::little_endian_overrun(60, 8, ByteOrder::LittleEndian)]
    #[case::big_endian_overrun(58, 8, ByteOrder::BigEndian)]
    fn new_rejects_signals_past_payload(
        #[case] start_bit: u16,
        #[case] bit_length: u8,
        #[case] byte_order: ByteOrder,
    ) {
        let result = SignalLayout::new(&signal(start_bit, bit_length, byte_order), 8);
        assert_matches!(result, Err(LayoutError::OutOfBounds { payload_len: 8, .. }));
    }

    #[rstest]
    #[case::zero(0)]
    #[case::too_wide(65)]
    fn new_rejects_invalid_width(#[case] bit_length: u8) {
        let result = SignalLayout::new(&signal(0, bit_length, ByteOrder::LittleEndian), 8);
        assert_matches!(result, Err(LayoutError::InvalidBitLength { .. }));
    }

    #[test]
    fn layout_built_for_full_payload_rejects_shorter_one() {
        let sample = signal(8, 16, ByteOrder::LittleEndian);
        let layout = SignalLayout::new(&sample, 8).expect("fits 8 bytes");

        assert_eq!(Ok(()), layout.check_fits(&sample, 3));
        assert_matches!(
            layout.check_fits(&sample, 2),
            Err(LayoutError::OutOfBounds { payload_len: 2, bit_length: 16, .. })
        );
    }
}
