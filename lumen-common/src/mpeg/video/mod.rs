// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::warn;

use lumen_core::errors::{decode_error, Result};
use lumen_core::io::{BitReaderLtr, BitWriterLtr, FiniteBitStream, ReadBitsLtr};
use lumen_core::video::dovi::DoviCompression;

pub mod nal;

/// The Dolby Vision decoder configuration record.
///
/// This is the payload of the `dvcC`, `dvvC`, and `dvwC` ISO-BMFF boxes, and of the equivalent
/// Matroska block addition mapping. An all-zero record means "no Dolby Vision configuration".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DoviDecoderConfigurationRecord {
    pub dv_version_major: u8,
    pub dv_version_minor: u8,
    pub dv_profile: u8,
    pub dv_level: u8,
    pub rpu_present_flag: bool,
    pub el_present_flag: bool,
    pub bl_present_flag: bool,
    pub dv_bl_signal_compatibility_id: u8,
    pub dv_md_compression: DoviCompression,
}

impl DoviDecoderConfigurationRecord {
    /// The size of a serialized record.
    pub const SIZE: usize = 24;

    pub fn read(buf: &[u8]) -> Result<Self> {
        // Parse the DOVIDecoderConfigurationRecord, point 3.2 from
        // https://professional.dolby.com/siteassets/content-creation/dolby-vision-for-content-creators/dolby_vision_bitstreams_within_the_iso_base_media_file_format_dec2017.pdf
        if buf.len() < 4 {
            return decode_error("common (dovi): configuration record is too short");
        }

        let mut br = BitReaderLtr::new(buf);

        let mut config = DoviDecoderConfigurationRecord {
            dv_version_major: br.read_bits_leq32(8)? as u8,
            dv_version_minor: br.read_bits_leq32(8)? as u8,
            dv_profile: br.read_bits_leq32(7)? as u8,
            dv_level: br.read_bits_leq32(6)? as u8,
            rpu_present_flag: br.read_bit()?,
            el_present_flag: br.read_bit()?,
            bl_present_flag: br.read_bit()?,
            ..Default::default()
        };

        // Older muxers truncate the record after the presence flags.
        if br.bits_left() >= 8 {
            config.dv_bl_signal_compatibility_id = br.read_bits_leq32(4)? as u8;
            config.dv_md_compression = DoviCompression::from_bits(br.read_bits_leq32(2)? as u8);
        }

        if config.dv_version_major > 2 {
            warn!("common (dovi): unknown configuration record version {}", config.dv_version_major);
        }

        Ok(config)
    }

    /// Serializes the record, including the trailing reserved bytes.
    pub fn write(&self) -> [u8; Self::SIZE] {
        let mut bw = BitWriterLtr::with_capacity(Self::SIZE);

        bw.write_bits_leq32(u32::from(self.dv_version_major), 8);
        bw.write_bits_leq32(u32::from(self.dv_version_minor), 8);
        bw.write_bits_leq32(u32::from(self.dv_profile), 7);
        bw.write_bits_leq32(u32::from(self.dv_level), 6);
        bw.write_bit(self.rpu_present_flag);
        bw.write_bit(self.el_present_flag);
        bw.write_bit(self.bl_present_flag);
        bw.write_bits_leq32(u32::from(self.dv_bl_signal_compatibility_id), 4);
        bw.write_bits_leq32(self.dv_md_compression as u32, 2);
        bw.write_bits_leq32(0, 26);

        let mut record = [0u8; Self::SIZE];
        let written = bw.into_bytes();
        record[..written.len()].copy_from_slice(&written);
        record
    }

    /// Returns true if the record describes a Dolby Vision stream.
    pub fn is_present(&self) -> bool {
        self.dv_profile != 0 || self.dv_level != 0 || self.rpu_present_flag
    }

    /// Gets the ISO-BMFF box type that carries this record.
    pub fn box_type(&self) -> [u8; 4] {
        match self.dv_profile {
            0..=7 => *b"dvcC",
            8..=10 => *b"dvvC",
            _ => *b"dvwC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_read_dvcc() {
        // Profile 8.1, level 6, RPU and BL present, compatibility ID 1.
        let buf = [1, 0, 0x10, 0x35, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

        let config = DoviDecoderConfigurationRecord::read(&buf).unwrap();

        assert_eq!(config.dv_version_major, 1);
        assert_eq!(config.dv_version_minor, 0);
        assert_eq!(config.dv_profile, 8);
        assert_eq!(config.dv_level, 6);
        assert!(config.rpu_present_flag);
        assert!(!config.el_present_flag);
        assert!(config.bl_present_flag);
        assert_eq!(config.dv_bl_signal_compatibility_id, 1);
        assert_eq!(config.dv_md_compression, DoviCompression::None);
        assert_eq!(&config.box_type(), b"dvvC");

        assert_eq!(config.write(), buf);
    }

    #[test]
    fn verify_write_compression() {
        let config = DoviDecoderConfigurationRecord {
            dv_version_major: 1,
            dv_profile: 10,
            dv_level: 13,
            rpu_present_flag: true,
            bl_present_flag: true,
            dv_bl_signal_compatibility_id: 4,
            dv_md_compression: DoviCompression::Extended,
            ..Default::default()
        };

        let buf = config.write();

        // compatibility ID (0100), compression (11), reserved (00).
        assert_eq!(buf[4], 0b0100_1100);
        assert_eq!(DoviDecoderConfigurationRecord::read(&buf).unwrap(), config);
    }

    #[test]
    fn verify_read_truncated() {
        assert!(DoviDecoderConfigurationRecord::read(&[1, 0, 0x0a]).is_err());

        let config = DoviDecoderConfigurationRecord::read(&[1, 0, 0x0a, 0x25]).unwrap();
        assert_eq!(config.dv_profile, 5);
        assert_eq!(config.dv_level, 4);
        assert_eq!(config.dv_bl_signal_compatibility_id, 0);
        assert!(config.is_present());

        assert!(!DoviDecoderConfigurationRecord::default().is_present());
    }
}
