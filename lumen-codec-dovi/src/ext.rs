// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display management extension block bodies.
//!
//! Blocks are carried in two groups. The first group holds the CM v2.9 levels (1, 2, 4, 5, 6, and
//! 255), the second group the CM v4.0 levels (3, 8, 9, 10, 11, and 254). Every block is preceded
//! by its length in bytes and its level, and padded with zero bits up to its length.

use lumen_core::errors::{decode_error, Result};
use lumen_core::io::{BitReaderLtr, BitWriterLtr, ReadBitsLtr};
use lumen_core::video::dovi::*;

fn read_u8(bs: &mut BitReaderLtr<'_>, bits: u32) -> Result<u8> {
    Ok(bs.read_bits_leq32(bits)? as u8)
}

fn read_u16(bs: &mut BitReaderLtr<'_>, bits: u32) -> Result<u16> {
    Ok(bs.read_bits_leq32(bits)? as u16)
}

fn read_primaries(bs: &mut BitReaderLtr<'_>) -> Result<DisplayPrimaries> {
    let mut read = || -> Result<i16> { Ok(bs.read_bits_leq32_signed(16)? as i16) };

    Ok(DisplayPrimaries {
        red_x: read()?,
        red_y: read()?,
        green_x: read()?,
        green_y: read()?,
        blue_x: read()?,
        blue_y: read()?,
        white_x: read()?,
        white_y: read()?,
    })
}

fn write_primaries(bw: &mut BitWriterLtr, p: &DisplayPrimaries) {
    for v in [p.red_x, p.red_y, p.green_x, p.green_y, p.blue_x, p.blue_y, p.white_x, p.white_y] {
        bw.write_bits_leq32_signed(i32::from(v), 16);
    }
}

/// Reads the body of a block of the first (CM v2.9) group. Returns `None` for unknown levels.
pub(crate) fn read_ext_block_v1(bs: &mut BitReaderLtr<'_>, level: u8) -> Result<Option<DmData>> {
    let block = match level {
        1 => DmData::Level1(DmLevel1 {
            min_pq: read_u16(bs, 12)?,
            max_pq: read_u16(bs, 12)?,
            avg_pq: read_u16(bs, 12)?,
        }),
        2 => DmData::Level2(DmLevel2 {
            target_max_pq: read_u16(bs, 12)?,
            trim_slope: read_u16(bs, 12)?,
            trim_offset: read_u16(bs, 12)?,
            trim_power: read_u16(bs, 12)?,
            trim_chroma_weight: read_u16(bs, 12)?,
            trim_saturation_gain: read_u16(bs, 12)?,
            ms_weight: bs.read_bits_leq32_signed(13)? as i16,
        }),
        4 => DmData::Level4(DmLevel4 {
            anchor_pq: read_u16(bs, 12)?,
            anchor_power: read_u16(bs, 12)?,
        }),
        5 => DmData::Level5(DmLevel5 {
            left_offset: read_u16(bs, 13)?,
            right_offset: read_u16(bs, 13)?,
            top_offset: read_u16(bs, 13)?,
            bottom_offset: read_u16(bs, 13)?,
        }),
        6 => DmData::Level6(DmLevel6 {
            max_luminance: read_u16(bs, 16)?,
            min_luminance: read_u16(bs, 16)?,
            max_cll: read_u16(bs, 16)?,
            max_fall: read_u16(bs, 16)?,
        }),
        255 => {
            let dm_run_mode = read_u8(bs, 8)?;
            let dm_run_version = read_u8(bs, 8)?;

            let mut dm_debug = [0; 4];
            for debug in dm_debug.iter_mut() {
                *debug = read_u8(bs, 8)?;
            }

            DmData::Level255(DmLevel255 { dm_run_mode, dm_run_version, dm_debug })
        }
        _ => return Ok(None),
    };

    Ok(Some(block))
}

/// Reads the body of a block of the second (CM v4.0) group. The length of some blocks selects
/// which optional fields are present. Returns `None` for unknown levels.
pub(crate) fn read_ext_block_v2(
    bs: &mut BitReaderLtr<'_>,
    level: u8,
    length: u64,
) -> Result<Option<DmData>> {
    let block = match level {
        3 => DmData::Level3(DmLevel3 {
            min_pq_offset: read_u16(bs, 12)?,
            max_pq_offset: read_u16(bs, 12)?,
            avg_pq_offset: read_u16(bs, 12)?,
        }),
        8 => {
            if length < 10 {
                return decode_error("dovi: level 8 extension block is too short");
            }

            let mut l8 = DmLevel8 {
                target_display_index: read_u8(bs, 8)?,
                trim_slope: read_u16(bs, 12)?,
                trim_offset: read_u16(bs, 12)?,
                trim_power: read_u16(bs, 12)?,
                trim_chroma_weight: read_u16(bs, 12)?,
                trim_saturation_gain: read_u16(bs, 12)?,
                ms_weight: read_u16(bs, 12)?,
                ..Default::default()
            };

            if length >= 12 {
                l8.target_mid_contrast = read_u16(bs, 12)?;
            }
            if length >= 13 {
                l8.clip_trim = read_u16(bs, 12)?;
            }
            if length >= 19 {
                for v in l8.saturation_vector_field.iter_mut() {
                    *v = read_u8(bs, 8)?;
                }
            }
            if length >= 25 {
                for v in l8.hue_vector_field.iter_mut() {
                    *v = read_u8(bs, 8)?;
                }
            }

            DmData::Level8(l8)
        }
        9 => {
            let mut l9 =
                DmLevel9 { source_primary_index: read_u8(bs, 8)?, ..Default::default() };

            if length > 1 {
                l9.source_display_primaries = read_primaries(bs)?;
            }

            DmData::Level9(l9)
        }
        10 => {
            let mut l10 = DmLevel10 {
                target_display_index: read_u8(bs, 8)?,
                target_max_pq: read_u16(bs, 12)?,
                target_min_pq: read_u16(bs, 12)?,
                target_primary_index: read_u8(bs, 8)?,
                ..Default::default()
            };

            if length > 5 {
                l10.target_display_primaries = read_primaries(bs)?;
            }

            DmData::Level10(l10)
        }
        11 => {
            let content_type = read_u8(bs, 8)?;
            let whitepoint = read_u8(bs, 4)?;
            let reference_mode_flag = bs.read_bit()?;
            bs.ignore_bits(3)?;

            DmData::Level11(DmLevel11 {
                content_type,
                whitepoint,
                reference_mode_flag,
                sharpness: read_u8(bs, 2)?,
                noise_reduction: read_u8(bs, 2)?,
                mpeg_noise_reduction: read_u8(bs, 2)?,
                frame_rate_conversion: read_u8(bs, 2)?,
                brightness: read_u8(bs, 2)?,
                color: read_u8(bs, 2)?,
            })
        }
        254 => DmData::Level254(DmLevel254 {
            dm_mode: read_u8(bs, 8)?,
            dm_version_index: read_u8(bs, 8)?,
        }),
        _ => return Ok(None),
    };

    Ok(Some(block))
}

/// Gets the coded length, in bytes, of the body of `block`.
pub(crate) fn ext_block_length(block: &DmData) -> u32 {
    match block {
        DmData::Level1(_) => 5,
        DmData::Level2(_) => 11,
        DmData::Level3(_) => 5,
        DmData::Level4(_) => 3,
        DmData::Level5(_) => 7,
        DmData::Level6(_) => 8,
        DmData::Level8(l8) => {
            if l8.hue_vector_field.iter().any(|&v| v != 0) {
                25
            }
            else if l8.saturation_vector_field.iter().any(|&v| v != 0) {
                19
            }
            else if l8.clip_trim != 0 {
                13
            }
            else if l8.target_mid_contrast != 0 {
                12
            }
            else {
                10
            }
        }
        DmData::Level9(l9) => {
            if l9.source_primary_index == 255 || !l9.source_display_primaries.is_zero() {
                17
            }
            else {
                1
            }
        }
        DmData::Level10(l10) => {
            if l10.target_primary_index == 255 || !l10.target_display_primaries.is_zero() {
                21
            }
            else {
                5
            }
        }
        DmData::Level11(_) => 4,
        DmData::Level254(_) => 2,
        DmData::Level255(_) => 6,
    }
}

/// Writes a complete block: its length, level, body, and padding.
pub(crate) fn write_ext_block(bw: &mut BitWriterLtr, block: &DmData) {
    let length = ext_block_length(block);

    bw.write_exp_golomb_unsigned(length);
    bw.write_bits_leq32(u32::from(block.level()), 8);

    let start = bw.bits_written();

    match block {
        DmData::Level1(l1) => {
            bw.write_bits_leq32(u32::from(l1.min_pq), 12);
            bw.write_bits_leq32(u32::from(l1.max_pq), 12);
            bw.write_bits_leq32(u32::from(l1.avg_pq), 12);
        }
        DmData::Level2(l2) => {
            bw.write_bits_leq32(u32::from(l2.target_max_pq), 12);
            bw.write_bits_leq32(u32::from(l2.trim_slope), 12);
            bw.write_bits_leq32(u32::from(l2.trim_offset), 12);
            bw.write_bits_leq32(u32::from(l2.trim_power), 12);
            bw.write_bits_leq32(u32::from(l2.trim_chroma_weight), 12);
            bw.write_bits_leq32(u32::from(l2.trim_saturation_gain), 12);
            bw.write_bits_leq32_signed(i32::from(l2.ms_weight), 13);
        }
        DmData::Level3(l3) => {
            bw.write_bits_leq32(u32::from(l3.min_pq_offset), 12);
            bw.write_bits_leq32(u32::from(l3.max_pq_offset), 12);
            bw.write_bits_leq32(u32::from(l3.avg_pq_offset), 12);
        }
        DmData::Level4(l4) => {
            bw.write_bits_leq32(u32::from(l4.anchor_pq), 12);
            bw.write_bits_leq32(u32::from(l4.anchor_power), 12);
        }
        DmData::Level5(l5) => {
            bw.write_bits_leq32(u32::from(l5.left_offset), 13);
            bw.write_bits_leq32(u32::from(l5.right_offset), 13);
            bw.write_bits_leq32(u32::from(l5.top_offset), 13);
            bw.write_bits_leq32(u32::from(l5.bottom_offset), 13);
        }
        DmData::Level6(l6) => {
            bw.write_bits_leq32(u32::from(l6.max_luminance), 16);
            bw.write_bits_leq32(u32::from(l6.min_luminance), 16);
            bw.write_bits_leq32(u32::from(l6.max_cll), 16);
            bw.write_bits_leq32(u32::from(l6.max_fall), 16);
        }
        DmData::Level8(l8) => {
            bw.write_bits_leq32(u32::from(l8.target_display_index), 8);
            bw.write_bits_leq32(u32::from(l8.trim_slope), 12);
            bw.write_bits_leq32(u32::from(l8.trim_offset), 12);
            bw.write_bits_leq32(u32::from(l8.trim_power), 12);
            bw.write_bits_leq32(u32::from(l8.trim_chroma_weight), 12);
            bw.write_bits_leq32(u32::from(l8.trim_saturation_gain), 12);
            bw.write_bits_leq32(u32::from(l8.ms_weight), 12);
            if length >= 12 {
                bw.write_bits_leq32(u32::from(l8.target_mid_contrast), 12);
            }
            if length >= 13 {
                bw.write_bits_leq32(u32::from(l8.clip_trim), 12);
            }
            if length >= 19 {
                bw.write_bytes(&l8.saturation_vector_field);
            }
            if length >= 25 {
                bw.write_bytes(&l8.hue_vector_field);
            }
        }
        DmData::Level9(l9) => {
            bw.write_bits_leq32(u32::from(l9.source_primary_index), 8);
            if length > 1 {
                write_primaries(bw, &l9.source_display_primaries);
            }
        }
        DmData::Level10(l10) => {
            bw.write_bits_leq32(u32::from(l10.target_display_index), 8);
            bw.write_bits_leq32(u32::from(l10.target_max_pq), 12);
            bw.write_bits_leq32(u32::from(l10.target_min_pq), 12);
            bw.write_bits_leq32(u32::from(l10.target_primary_index), 8);
            if length > 5 {
                write_primaries(bw, &l10.target_display_primaries);
            }
        }
        DmData::Level11(l11) => {
            bw.write_bits_leq32(u32::from(l11.content_type), 8);
            bw.write_bits_leq32(u32::from(l11.whitepoint), 4);
            bw.write_bit(l11.reference_mode_flag);
            bw.write_bits_leq32(0, 3);
            bw.write_bits_leq32(u32::from(l11.sharpness), 2);
            bw.write_bits_leq32(u32::from(l11.noise_reduction), 2);
            bw.write_bits_leq32(u32::from(l11.mpeg_noise_reduction), 2);
            bw.write_bits_leq32(u32::from(l11.frame_rate_conversion), 2);
            bw.write_bits_leq32(u32::from(l11.brightness), 2);
            bw.write_bits_leq32(u32::from(l11.color), 2);
        }
        DmData::Level254(l254) => {
            bw.write_bits_leq32(u32::from(l254.dm_mode), 8);
            bw.write_bits_leq32(u32::from(l254.dm_version_index), 8);
        }
        DmData::Level255(l255) => {
            bw.write_bits_leq32(u32::from(l255.dm_run_mode), 8);
            bw.write_bits_leq32(u32::from(l255.dm_run_version), 8);
            bw.write_bytes(&l255.dm_debug);
        }
    }

    let written = bw.bits_written() - start;
    debug_assert!(written <= 8 * u64::from(length));

    bw.write_bits_leq64(0, (8 * u64::from(length) - written) as u32);
}
