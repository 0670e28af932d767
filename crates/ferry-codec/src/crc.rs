//! Table-driven CRC service for bundle block integrity.
//!
//! A `CrcParameters` value fully describes one algorithm in Rocksoft
//! notation; the published sets cover the block-integrity choices the
//! bundle layer offers. Widths up to 32 bits share a `u32` register.

use std::sync::OnceLock;

/// One CRC algorithm: polynomial, seed, reflection, and final XOR.
///
/// `check` is the expected checksum over the bytes `"123456789"` and
/// doubles as a self-test vector.
pub struct CrcParameters {
    pub name: &'static str,
    /// Register width in bits; zero disables checking entirely.
    pub width: u8,
    pub polynomial: u32,
    pub initial: u32,
    /// Input and output bit reflection (always paired here).
    pub reflect: bool,
    pub final_xor: u32,
    pub check: u32,
    table: OnceLock<[u32; 256]>,
}

/// Integrity checking disabled; every digest is zero.
pub static CRC_NONE: CrcParameters = CrcParameters::new("NONE", 0, 0, 0, false, 0, 0);

/// CRC-16/X-25, the narrow block-integrity option.
pub static CRC16_X25: CrcParameters =
    CrcParameters::new("CRC-16/X-25", 16, 0x1021, 0xffff, true, 0xffff, 0x906e);

/// CRC-32/Castagnoli, the wide block-integrity option.
pub static CRC32_CASTAGNOLI: CrcParameters = CrcParameters::new(
    "CRC-32/Castagnoli",
    32,
    0x1edc_6f41,
    0xffff_ffff,
    true,
    0xffff_ffff,
    0xe306_9283,
);

/// Looks up a published parameter set by name.
pub fn get(name: &str) -> Option<&'static CrcParameters> {
    [&CRC_NONE, &CRC16_X25, &CRC32_CASTAGNOLI]
        .into_iter()
        .find(|params| params.name == name)
}

fn reflect_bits(value: u32, bits: u8) -> u32 {
    let mut input = value;
    let mut output = 0_u32;
    for _ in 0..bits {
        output = (output << 1) | (input & 1);
        input >>= 1;
    }
    output
}

impl CrcParameters {
    pub const fn new(
        name: &'static str,
        width: u8,
        polynomial: u32,
        initial: u32,
        reflect: bool,
        final_xor: u32,
        check: u32,
    ) -> Self {
        CrcParameters {
            name,
            width,
            polynomial,
            initial,
            reflect,
            final_xor,
            check,
            table: OnceLock::new(),
        }
    }

    fn mask(&self) -> u32 {
        match self.width {
            0 => 0,
            32 => u32::MAX,
            w => (1 << w) - 1,
        }
    }

    fn table(&self) -> &[u32; 256] {
        self.table.get_or_init(|| {
            let mut table = [0_u32; 256];
            if self.width == 0 {
                return table;
            }
            if self.reflect {
                let poly = reflect_bits(self.polynomial, self.width);
                for (index, entry) in table.iter_mut().enumerate() {
                    let mut crc = index as u32;
                    for _ in 0..8 {
                        crc = if crc & 1 != 0 { (crc >> 1) ^ poly } else { crc >> 1 };
                    }
                    *entry = crc;
                }
            } else {
                let top = 1_u32 << (self.width - 1);
                for (index, entry) in table.iter_mut().enumerate() {
                    let mut crc = (index as u32) << (self.width - 8);
                    for _ in 0..8 {
                        crc = if crc & top != 0 {
                            (crc << 1) ^ self.polynomial
                        } else {
                            crc << 1
                        };
                    }
                    *entry = crc & self.mask();
                }
            }
            table
        })
    }

    /// Seed for an incremental computation.
    pub fn initial_value(&self) -> u32 {
        self.initial & self.mask()
    }

    /// Folds `data` into a running register value.
    pub fn update(&self, crc: u32, data: &[u8]) -> u32 {
        if self.width == 0 {
            return 0;
        }
        let table = self.table();
        let mut crc = crc;
        if self.reflect {
            for byte in data {
                let index = ((crc ^ u32::from(*byte)) & 0xff) as usize;
                crc = table[index] ^ (crc >> 8);
            }
        } else {
            let shift = u32::from(self.width) - 8;
            for byte in data {
                let index = (((crc >> shift) ^ u32::from(*byte)) & 0xff) as usize;
                crc = (table[index] ^ (crc << 8)) & self.mask();
            }
        }
        crc
    }

    /// Applies the final XOR, yielding the digest.
    pub fn finalize(&self, crc: u32) -> u32 {
        (crc ^ self.final_xor) & self.mask()
    }

    /// One-shot digest over `data`.
    pub fn checksum(&self, data: &[u8]) -> u32 {
        self.finalize(self.update(self.initial_value(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::{get, CrcParameters, CRC16_X25, CRC32_CASTAGNOLI, CRC_NONE};

    const CHECK_INPUT: &[u8] = b"123456789";

    #[test]
    fn published_sets_pass_their_self_test() {
        assert_eq!(CRC16_X25.checksum(CHECK_INPUT), CRC16_X25.check);
        assert_eq!(CRC32_CASTAGNOLI.checksum(CHECK_INPUT), CRC32_CASTAGNOLI.check);
        assert_eq!(CRC_NONE.checksum(CHECK_INPUT), 0);
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let mut crc = CRC32_CASTAGNOLI.initial_value();
        crc = CRC32_CASTAGNOLI.update(crc, b"1234");
        crc = CRC32_CASTAGNOLI.update(crc, b"");
        crc = CRC32_CASTAGNOLI.update(crc, b"56789");
        assert_eq!(
            CRC32_CASTAGNOLI.finalize(crc),
            CRC32_CASTAGNOLI.checksum(CHECK_INPUT)
        );
    }

    #[test]
    fn custom_unreflected_sets_are_supported() {
        // CRC-16/IBM-3740, the classic unreflected 0x1021 variant.
        let ibm_3740 = CrcParameters::new("CRC-16/IBM-3740", 16, 0x1021, 0xffff, false, 0, 0x29b1);
        assert_eq!(ibm_3740.checksum(CHECK_INPUT), ibm_3740.check);
    }

    #[test]
    fn digests_differ_on_corruption() {
        let clean = CRC16_X25.checksum(b"custody record");
        let corrupt = CRC16_X25.checksum(b"custody recorc");
        assert_ne!(clean, corrupt);
    }

    #[test]
    fn lookup_by_name_finds_published_sets() {
        assert_eq!(get("CRC-16/X-25").map(|p| p.width), Some(16));
        assert_eq!(get("CRC-32/Castagnoli").map(|p| p.width), Some(32));
        assert_eq!(get("NONE").map(|p| p.width), Some(0));
        assert!(get("CRC-8/NOPE").is_none());
    }
}
