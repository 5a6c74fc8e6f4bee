//! CRC-16/CCITT with a zero initial value (a.k.a. CRC-16/XMODEM).
//!
//! Polynomial 0x1021, MSB-first, no reflection, no final XOR.

const POLY: u16 = 0x1021;

/// Incremental CRC state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { value: 0x0000 }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.value;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ POLY
                } else {
                    crc << 1
                };
            }
        }
        self.value = crc;
    }

    pub fn finish(&self) -> u16 {
        self.value
    }
}

/// CRC over a whole slice.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_matches_xmodem() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_input_is_initial_value() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = b"\x01\x00\x00\x01\x00\x12";
        let mut crc = Crc16::new();
        crc.update(&data[..2]);
        crc.update(&data[2..]);
        assert_eq!(crc.finish(), crc16(data));
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let a = crc16(b"\x00\x03\x00\x64\x00\x01\x01\x02\x03");
        let b = crc16(b"\x00\x03\x00\x64\x00\x01\x01\x02\x07");
        assert_ne!(a, b);
    }
}
