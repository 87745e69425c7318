use std::fmt;

use thiserror::Error;

use crate::crc::Crc16Arc;

/// Length of one wire frame in bytes.
pub const FRAME_LEN: usize = 12;
/// Length of the frame payload in bytes.
pub const PAYLOAD_LEN: usize = 8;

const HEADER_END: usize = 2;
const PAYLOAD_END: usize = HEADER_END + PAYLOAD_LEN;
const DEVICE_ADDRESS_MASK: u16 = 0x001F;
const MESSAGE_ID_SHIFT: u16 = 5;
const MESSAGE_ID_MASK: u16 = 0x03FF;
const RESERVED_SHIFT: u16 = 15;

/// Highest device address representable in the 5-bit header field.
pub const MAX_DEVICE_ADDRESS: u8 = 0x1F;
/// Highest message id representable in the 10-bit header field.
pub const MAX_MESSAGE_ID: u16 = 0x03FF;

/// Errors returned by frame encoding and decoding.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameError {
    /// The input is not exactly one frame long.
    #[error("frame must be exactly 12 bytes, got {actual}")]
    WrongLength { actual: usize },
    /// The trailing checksum does not match the frame contents.
    #[error("frame checksum mismatch: computed {expected:#06X}, frame carries {actual:#06X}")]
    CrcMismatch { expected: u16, actual: u16 },
    /// The textual frame is not valid hexadecimal.
    #[error("frame is not valid hex: {reason}")]
    InvalidHex { reason: String },
    /// A header field does not fit its bit width.
    #[error("header field `{field}` value {value} exceeds max {max}")]
    HeaderFieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u16,
    },
}

/// Header fields packed into the first 16-bit word of a frame.
///
/// Bits `0..5` carry the device address, bits `5..15` the message id and
/// bit `15` is reserved.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct FrameHeader {
    device_address: u8,
    message_id: u16,
    reserved: bool,
}

impl FrameHeader {
    /// Creates a header with the reserved bit cleared.
    ///
    /// # Errors
    ///
    /// Returns an error when a field does not fit its bit width.
    ///
    /// ```
    /// use busgate::FrameHeader;
    ///
    /// let header = FrameHeader::new(1, 100)?;
    /// assert_eq!(0x0C61, header.word());
    /// assert!(FrameHeader::new(32, 0).is_err());
    /// # Ok::<(), busgate::FrameError>(())
    /// ```
    pub fn new(device_address: u8, message_id: u16) -> Result<Self, FrameError> {
        if device_address > MAX_DEVICE_ADDRESS {
            return Err(FrameError::HeaderFieldOutOfRange {
                field: "device_address",
                value: u32::from(device_address),
                max: u16::from(MAX_DEVICE_ADDRESS),
            });
        }
        if message_id > MAX_MESSAGE_ID {
            return Err(FrameError::HeaderFieldOutOfRange {
                field: "message_id",
                value: u32::from(message_id),
                max: MAX_MESSAGE_ID,
            });
        }

        Ok(Self {
            device_address,
            message_id,
            reserved: false,
        })
    }

    /// Splits a raw header word into its fields.
    ///
    /// ```
    /// use busgate::FrameHeader;
    ///
    /// let header = FrameHeader::from_word(0x8C61);
    /// assert_eq!(1, header.device_address());
    /// assert_eq!(100, header.message_id());
    /// assert!(header.reserved());
    /// ```
    #[must_use]
    pub const fn from_word(word: u16) -> Self {
        Self {
            device_address: (word & DEVICE_ADDRESS_MASK) as u8,
            message_id: (word >> MESSAGE_ID_SHIFT) & MESSAGE_ID_MASK,
            reserved: (word >> RESERVED_SHIFT) & 1 == 1,
        }
    }

    /// Packs the fields back into the header word.
    #[must_use]
    pub const fn word(self) -> u16 {
        (self.device_address as u16)
            | (self.message_id << MESSAGE_ID_SHIFT)
            | ((self.reserved as u16) << RESERVED_SHIFT)
    }

    /// Returns the 5-bit device address.
    #[must_use]
    pub const fn device_address(self) -> u8 {
        self.device_address
    }

    /// Returns the 10-bit message id.
    #[must_use]
    pub const fn message_id(self) -> u16 {
        self.message_id
    }

    /// Returns the reserved bit.
    #[must_use]
    pub const fn reserved(self) -> bool {
        self.reserved
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dev={} msg={} word={:#06X}",
            self.device_address,
            self.message_id,
            self.word()
        )
    }
}

/// A frame that passed length and checksum validation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DecodedFrame {
    header: FrameHeader,
    payload: [u8; PAYLOAD_LEN],
    checksum: u16,
}

impl DecodedFrame {
    /// Returns the decoded header.
    #[must_use]
    pub fn header(&self) -> FrameHeader {
        self.header
    }

    /// Returns the 8-byte payload.
    #[must_use]
    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }

    /// Returns the verified checksum.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.checksum
    }
}

/// Encoder and decoder for fixed 12-byte bus frames.
pub struct FrameCodec;

impl FrameCodec {
    /// Validates and splits one wire frame.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame is not 12 bytes long or its checksum
    /// does not match.
    ///
    /// ```
    /// use busgate::FrameCodec;
    ///
    /// let frame = [0x61, 0x0C, 1, 2, 3, 4, 5, 6, 7, 8, 0x00, 0x00];
    /// let frame = FrameCodec::seal(frame);
    /// let decoded = FrameCodec::decode(&frame)?;
    /// assert_eq!(1, decoded.header().device_address());
    /// assert_eq!(100, decoded.header().message_id());
    /// assert_eq!(&[1, 2, 3, 4, 5, 6, 7, 8], decoded.payload());
    /// # Ok::<(), busgate::FrameError>(())
    /// ```
    pub fn decode(raw: &[u8]) -> Result<DecodedFrame, FrameError> {
        let frame: &[u8; FRAME_LEN] = raw
            .try_into()
            .map_err(|_length| FrameError::WrongLength { actual: raw.len() })?;

        let actual = u16::from_le_bytes([frame[PAYLOAD_END], frame[PAYLOAD_END + 1]]);
        let expected = Crc16Arc::checksum(&frame[..PAYLOAD_END]);
        if expected != actual {
            return Err(FrameError::CrcMismatch { expected, actual });
        }

        let header = FrameHeader::from_word(u16::from_le_bytes([frame[0], frame[1]]));
        let mut payload = [0_u8; PAYLOAD_LEN];
        payload.copy_from_slice(&frame[HEADER_END..PAYLOAD_END]);

        Ok(DecodedFrame {
            header,
            payload,
            checksum: actual,
        })
    }

    /// Decodes a frame given as hexadecimal text.
    ///
    /// Whitespace between byte pairs is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not hex or the frame is invalid.
    pub fn decode_hex(text: &str) -> Result<DecodedFrame, FrameError> {
        let bytes = parse_hex(text)?;
        Self::decode(&bytes)
    }

    /// Builds a complete frame from a header and payload.
    ///
    /// ```
    /// use busgate::{FrameCodec, FrameHeader};
    ///
    /// let header = FrameHeader::new(1, 100)?;
    /// let frame = FrameCodec::encode(header, [1, 2, 3, 4, 5, 6, 7, 8]);
    /// assert_eq!([0x61, 0x0C], [frame[0], frame[1]]);
    /// assert!(FrameCodec::decode(&frame).is_ok());
    /// # Ok::<(), busgate::FrameError>(())
    /// ```
    #[must_use]
    pub fn encode(header: FrameHeader, payload: [u8; PAYLOAD_LEN]) -> [u8; FRAME_LEN] {
        let mut frame = [0_u8; FRAME_LEN];
        frame[..HEADER_END].copy_from_slice(&header.word().to_le_bytes());
        frame[HEADER_END..PAYLOAD_END].copy_from_slice(&payload);
        Self::seal(frame)
    }

    /// Recomputes and writes the trailing checksum of `frame`.
    #[must_use]
    pub fn seal(mut frame: [u8; FRAME_LEN]) -> [u8; FRAME_LEN] {
        let checksum = Crc16Arc::checksum(&frame[..PAYLOAD_END]);
        frame[PAYLOAD_END..].copy_from_slice(&checksum.to_le_bytes());
        frame
    }
}

pub(crate) fn parse_hex(text: &str) -> Result<Vec<u8>, FrameError> {
    let compact: String = text.split_whitespace().collect();
    hex::decode(compact).map_err(|error| FrameError::InvalidHex {
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const SAMPLE_PAYLOAD: [u8; PAYLOAD_LEN] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    fn sample_frame() -> [u8; FRAME_LEN] {
        let header = FrameHeader::new(1, 100).expect("sample header fields are in range");
        FrameCodec::encode(header, SAMPLE_PAYLOAD)
    }

    #[test]
    fn decode_recovers_sample_fields() {
        let frame = sample_frame();
        assert_eq!([0x61, 0x0C], [frame[0], frame[1]]);

        let decoded = FrameCodec::decode(&frame).expect("sealed frame should decode");
        assert_eq!(1, decoded.header().device_address());
        assert_eq!(100, decoded.header().message_id());
        assert!(!decoded.header().reserved());
        assert_eq!(&SAMPLE_PAYLOAD, decoded.payload());
        assert_eq!(
            Crc16Arc::checksum(&frame[..PAYLOAD_END]),
            decoded.checksum()
        );
    }

    #[rstest]
    #[case::empty(0)]
    #[case::short(5)]
    #[case::one_short(11)]
    #[case::one_long(13)]
    #[case::double(24)]
    fn decode_rejects_wrong_length(#[case] len: usize) {
        let raw = vec![0_u8; len];
        assert_matches!(
            FrameCodec::decode(&raw),
            Err(FrameError::WrongLength { actual }) if actual == len
        );
    }

    #[test]
    fn decode_rejects_all_zero_frame() {
        let result = FrameCodec::decode(&[0_u8; FRAME_LEN]);
        assert_matches!(result, Err(FrameError::CrcMismatch { actual: 0, .. }));
    }

    #[test]
    fn any_single_bit_flip_in_checksum_is_rejected() {
        let frame = sample_frame();
        for byte in PAYLOAD_END..FRAME_LEN {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[byte] ^= 1 << bit;
                assert_matches!(
                    FrameCodec::decode(&corrupted),
                    Err(FrameError::CrcMismatch { .. }),
                    "flipping bit {bit} of byte {byte} should fail the checksum"
                );
            }
        }
    }

    #[test]
    fn every_header_word_survives_seal_and_decode() {
        for word in 0..=u16::MAX {
            let header = FrameHeader::from_word(word);
            assert_eq!(word, header.word());
            assert_eq!(word & 0x1F, u16::from(header.device_address()));
            assert_eq!((word >> 5) & 0x3FF, header.message_id());

            let mut frame = [0_u8; FRAME_LEN];
            frame[..HEADER_END].copy_from_slice(&word.to_le_bytes());
            frame[HEADER_END..PAYLOAD_END].copy_from_slice(&SAMPLE_PAYLOAD);
            let decoded = FrameCodec::decode(&FrameCodec::seal(frame))
                .unwrap_or_else(|error| panic!("sealed frame {word:#06X} failed: {error}"));
            assert_eq!(header, decoded.header());
            assert_eq!(&SAMPLE_PAYLOAD, decoded.payload());
        }
    }

    #[test]
    fn header_rejects_out_of_range_fields() {
        assert_matches!(
            FrameHeader::new(0, 1024),
            Err(FrameError::HeaderFieldOutOfRange {
                field: "message_id",
                value: 1024,
                max: 1023,
            })
        );
        assert_matches!(
            FrameHeader::new(32, 0),
            Err(FrameError::HeaderFieldOutOfRange {
                field: "device_address",
                ..
            })
        );
    }

    #[test]
    fn decode_hex_accepts_spaced_input() {
        let frame = sample_frame();
        let spaced = frame
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let decoded = FrameCodec::decode_hex(&spaced).expect("spaced hex should decode");
        assert_eq!(100, decoded.header().message_id());
    }

    #[test]
    fn decode_hex_rejects_non_hex() {
        assert_matches!(
            FrameCodec::decode_hex("zz"),
            Err(FrameError::InvalidHex { .. })
        );
    }
}
