// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::io::Monitor;

const fn build_crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;

        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            bit += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Lookup table for the MSB-first CRC-32 with the polynomial 0x04c11db7.
static CRC32_TABLE: [u32; 256] = build_crc32_table(0x04c1_1db7);

/// `Crc32` implements the MSB-first (non-reflected) CRC-32 with the polynomial 0x04c11db7 and no
/// final XOR.
///
/// Initialized with a state of `0xffff_ffff`, this is CRC-32/MPEG-2 as used by MPEG transport
/// streams and Dolby Vision RPUs.
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Instantiate a `Crc32` instance with an initial state.
    pub fn new(state: u32) -> Self {
        Crc32 { state }
    }

    /// Instantiate a CRC-32/MPEG-2 instance.
    pub fn mpeg2() -> Self {
        Crc32::new(0xffff_ffff)
    }

    /// Returns the computed CRC.
    pub fn crc(&self) -> u32 {
        self.state
    }
}

impl Monitor for Crc32 {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.state =
            (self.state << 8) ^ CRC32_TABLE[usize::from((self.state >> 24) as u8 ^ byte)];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.process_byte(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Crc32;
    use crate::io::Monitor;

    #[test]
    fn verify_crc32_mpeg2() {
        let mut crc = Crc32::mpeg2();
        crc.process_buf_bytes(b"123456789");
        assert_eq!(crc.crc(), 0x0376_e6e7);

        // Empty input leaves the initial state untouched.
        assert_eq!(Crc32::mpeg2().crc(), 0xffff_ffff);
    }

    #[test]
    fn verify_crc32_split_input() {
        let mut whole = Crc32::mpeg2();
        whole.process_buf_bytes(&[0x19, 0x08, 0x09, 0x00, 0x80, 0x12, 0x34]);

        let mut parts = Crc32::mpeg2();
        parts.process_byte(0x19);
        parts.process_buf_bytes(&[0x08, 0x09]);
        parts.process_quad_bytes([0x00, 0x80, 0x12, 0x34]);

        assert_eq!(whole.crc(), parts.crc());
    }
}
