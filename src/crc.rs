const POLYNOMIAL: u16 = 0xA001;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0_u16; 256];
    let mut index = 0;
    while index < 256 {
        let mut register = index as u16;
        let mut bit = 0;
        while bit < 8 {
            register = if register & 1 == 1 {
                (register >> 1) ^ POLYNOMIAL
            } else {
                register >> 1
            };
            bit += 1;
        }
        table[index] = register;
        index += 1;
    }
    table
}

/// CRC-16/ARC checksum used to protect bus frames.
///
/// Reflected polynomial `0xA001`, initial register `0x0000`, no final XOR.
pub struct Crc16Arc;

impl Crc16Arc {
    /// Computes the checksum of `bytes`.
    ///
    /// ```
    /// use busgate::Crc16Arc;
    ///
    /// assert_eq!(0xBB3D, Crc16Arc::checksum(b"123456789"));
    /// assert_eq!(0x0000, Crc16Arc::checksum(b""));
    /// ```
    #[must_use]
    pub fn checksum(bytes: &[u8]) -> u16 {
        bytes.iter().fold(0_u16, |register, byte| {
            let index = usize::from((register ^ u16::from(*byte)) & 0x00FF);
            (register >> 8) ^ TABLE[index]
        })
    }

    /// Returns whether `bytes` hash to `expected`.
    ///
    /// ```
    /// use busgate::Crc16Arc;
    ///
    /// assert!(Crc16Arc::verify(b"123456789", 0xBB3D));
    /// assert!(!Crc16Arc::verify(b"123456789", 0xBB3C));
    /// ```
    #[must_use]
    pub fn verify(bytes: &[u8], expected: u16) -> bool {
        Self::checksum(bytes) == expected
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn bitwise_checksum(bytes: &[u8]) -> u16 {
        let mut register = 0_u16;
        for byte in bytes {
            register ^= u16::from(*byte);
            for _ in 0..8 {
                register = if register & 1 == 1 {
                    (register >> 1) ^ POLYNOMIAL
                } else {
                    register >> 1
                };
            }
        }
        register
    }

    #[test]
    fn table_matches_reference_entries() {
        assert_eq!(0x0000, TABLE[0x00]);
        assert_eq!(0xC0C1, TABLE[0x01]);
        assert_eq!(0x4040, TABLE[0xFF]);
    }

    #[rstest]
    #[case::check_string(b"123456789".as_slice(), 0xBB3D)]
    #[case::empty(b"".as_slice(), 0x0000)]
    #[case::single_zero(&[0x00], 0x0000)]
    #[case::single_one(&[0x01], 0xC0C1)]
    fn checksum_matches_known_vectors(#[case] input: &[u8], #[case] expected: u16) {
        assert_eq!(expected, Crc16Arc::checksum(input));
    }

    #[test]
    fn table_driven_checksum_matches_bitwise_form() {
        let inputs: [&[u8]; 4] = [
            b"test",
            &[0x61, 0x0C, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
            &[0xFF; 10],
            b"bus frame payload",
        ];
        for input in inputs {
            assert_eq!(bitwise_checksum(input), Crc16Arc::checksum(input));
        }
    }

    #[test]
    fn verify_rejects_wrong_checksum() {
        let checksum = Crc16Arc::checksum(b"test");
        assert!(Crc16Arc::verify(b"test", checksum));
        assert!(!Crc16Arc::verify(b"test", checksum ^ 0x0001));
    }
}
