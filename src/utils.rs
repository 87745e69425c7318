use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    let mut rendered = String::with_capacity(bytes.len().saturating_mul(3));
    for (index, value) in bytes.iter().enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        rendered.push_str(&hex::encode_upper([*value]));
    }
    rendered
}

/// Formats a checksum word as `0xXXXX`.
pub(crate) fn format_checksum(checksum: u16) -> String {
    format!("0x{checksum:04X}")
}

/// Returns the current UTC time as an RFC 3339 string.
pub(crate) fn rfc3339_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_error| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn format_hex_handles_empty_payload() {
        assert_eq!("<empty>", format_hex(&[]));
    }

    #[test]
    fn format_hex_formats_uppercase_pairs() {
        assert_eq!("05 00 A1 FF", format_hex(&[0x05, 0x00, 0xA1, 0xFF]));
    }

    #[test]
    fn format_checksum_pads_to_four_digits() {
        assert_eq!("0x00AB", format_checksum(0xAB));
    }

    #[test]
    fn rfc3339_now_parses_back() {
        let stamp = rfc3339_now();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok(), "{stamp}");
    }
}
