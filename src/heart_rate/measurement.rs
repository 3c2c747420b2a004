//! Decoding of the Bluetooth SIG Heart Rate Measurement characteristic (0x2A37).
//!
//! Only the heart rate value itself is read. Energy expended and RR interval
//! fields that may trail it are left untouched.

use thiserror::Error;

/// Bit 0 of the flags byte: set when the heart rate value is a `u16`.
const FLAG_HR_IS_U16: u8 = 1 << 0;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("payload is {actual} byte(s), needed at least {needed}")]
    Truncated { needed: usize, actual: usize },
}

/// Returns the heart rate in BPM contained in a raw measurement notification.
///
/// Values are passed through as-is, no physiological range checks happen here.
pub fn parse_hrm(data: &[u8]) -> Result<u16, FormatError> {
    let flags = *data.first().ok_or(FormatError::Truncated {
        needed: 2,
        actual: 0,
    })?;
    let hr_is_u16 = flags & FLAG_HR_IS_U16 != 0;
    let needed = if hr_is_u16 { 3 } else { 2 };

    // Includes the 2 byte case for u16 values, which would otherwise read past the end
    if data.len() < needed {
        return Err(FormatError::Truncated {
            needed,
            actual: data.len(),
        });
    }

    let bpm = if hr_is_u16 {
        u16::from_le_bytes([data[1], data[2]])
    } else {
        data[1] as u16
    };

    Ok(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_value() {
        assert_eq!(parse_hrm(&[0x00, 200]), Ok(200));
        assert_eq!(parse_hrm(&[0x00, 0]), Ok(0));
    }

    #[test]
    fn u16_value_little_endian() {
        assert_eq!(parse_hrm(&[0x01, 0xC8, 0x00]), Ok(200));
        assert_eq!(parse_hrm(&[0x01, 0xFF, 0x01]), Ok(511));
    }

    #[test]
    fn other_flags_are_ignored() {
        // Sensor contact + energy expended + RR present, still a u8 value
        let data = [0b0001_1110, 72, 0x10, 0x00, 0x00, 0x04, 0x10, 0x04];
        assert_eq!(parse_hrm(&data), Ok(72));
        // Same, but u16
        let data = [0b0001_1111, 0x2C, 0x01, 0x10, 0x00, 0x00, 0x04];
        assert_eq!(parse_hrm(&data), Ok(300));
    }

    #[test]
    fn out_of_range_passes_through() {
        assert_eq!(parse_hrm(&[0x01, 0xE8, 0x03]), Ok(1000));
    }

    #[test]
    fn truncated_payloads() {
        assert_eq!(
            parse_hrm(&[0x00]),
            Err(FormatError::Truncated {
                needed: 2,
                actual: 1
            })
        );
        assert_eq!(
            parse_hrm(&[]),
            Err(FormatError::Truncated {
                needed: 2,
                actual: 0
            })
        );
        assert_eq!(
            parse_hrm(&[0x01, 0xC8]),
            Err(FormatError::Truncated {
                needed: 3,
                actual: 2
            })
        );
    }
}
