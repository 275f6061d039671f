// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use log::{error, warn};

use lumen_core::codecs::ErrorRecognition;
use lumen_core::errors::{decode_error, rejected_error, unsupported_error, Result};
use lumen_core::io::{BitReaderLtr, FiniteBitStream, ReadBitsLtr};
use lumen_core::video::dovi::*;

use crate::container::{read_emdf, strip_nal_prefix, verify_rpu};
use crate::context::{ColorView, DoviContext, DoviExt};
use crate::ext::{read_ext_block_v1, read_ext_block_v2};
use crate::{extension_is_static, guess_profile_hevc, DOVI_MAX_DM_ID};
use crate::{DOVI_MAX_DYNAMIC_EXT_BLOCKS, DOVI_MAX_STATIC_EXT_BLOCKS};

/// Reads a signed reshaping coefficient.
fn read_se_coef(bs: &mut BitReaderLtr<'_>, hdr: &RpuDataHeader) -> Result<i64> {
    if hdr.coef_data_type == RPU_COEFF_FIXED {
        let ipart = i64::from(bs.read_exp_golomb_signed()?);
        let fpart = bs.read_bits_leq64(u32::from(hdr.coef_log2_denom))? as i64;

        Ok((ipart << hdr.coef_log2_denom).wrapping_add(fpart))
    }
    else {
        let value = f32::from_bits(bs.read_bits_leq32(32)?);

        Ok((f64::from(value) * (1u64 << hdr.coef_log2_denom) as f64) as i64)
    }
}

/// Reads an unsigned reshaping coefficient.
fn read_ue_coef(bs: &mut BitReaderLtr<'_>, hdr: &RpuDataHeader) -> Result<u64> {
    if hdr.coef_data_type == RPU_COEFF_FIXED {
        let ipart = u64::from(bs.read_exp_golomb_unsigned()?);
        let fpart = bs.read_bits_leq64(u32::from(hdr.coef_log2_denom))?;

        Ok((ipart << hdr.coef_log2_denom).wrapping_add(fpart))
    }
    else {
        let value = f32::from_bits(bs.read_bits_leq32(32)?);

        Ok((f64::from(value) * (1u64 << hdr.coef_log2_denom) as f64) as u64)
    }
}

/// Reads an Exp-Golomb coded ID, which may not exceed `DOVI_MAX_DM_ID`.
fn read_dm_id(bs: &mut BitReaderLtr<'_>) -> Result<usize> {
    let id = bs.read_exp_golomb_unsigned()? as usize;

    if id > DOVI_MAX_DM_ID {
        return decode_error("dovi: invalid rpu id");
    }

    Ok(id)
}

/// Reads `rpu_data_header()` up to, but excluding, the metadata presence flags. Set reserved bits
/// are only rejected by careful parsers.
fn read_rpu_header(
    bs: &mut BitReaderLtr<'_>,
    hdr: &mut RpuDataHeader,
    err_recognition: ErrorRecognition,
) -> Result<()> {
    hdr.rpu_format = bs.read_bits_leq32(11)? as u16;
    hdr.vdr_rpu_profile = bs.read_bits_leq32(4)? as u8;
    hdr.vdr_rpu_level = bs.read_bits_leq32(4)? as u8;

    if !bs.read_bit()? {
        return unsupported_error("dovi: rpu without vdr sequence info");
    }

    hdr.chroma_resampling_explicit_filter_flag = bs.read_bit()?;
    hdr.coef_data_type = bs.read_bits_leq32(2)? as u8;

    hdr.coef_log2_denom = match hdr.coef_data_type {
        RPU_COEFF_FIXED => {
            let denom = bs.read_exp_golomb_unsigned()?;

            if denom < 13 || denom > 32 {
                return decode_error("dovi: invalid coef_log2_denom");
            }

            denom as u8
        }
        RPU_COEFF_FLOAT => 32,
        _ => return decode_error("dovi: invalid coef_data_type"),
    };

    hdr.vdr_rpu_normalized_idc = bs.read_bits_leq32(2)? as u8;
    hdr.bl_video_full_range_flag = bs.read_bit()?;

    if hdr.rpu_format & 0x700 != 0 {
        return unsupported_error("dovi: unsupported rpu format");
    }

    let bl_bit_depth_minus8 = bs.read_exp_golomb_unsigned()?;
    let el_bit_depth_minus8 = bs.read_exp_golomb_unsigned()?;
    let vdr_bit_depth_minus8 = bs.read_exp_golomb_unsigned()?;

    // The upper bits of the enhancement layer bit depth carry the extended mapping IDC.
    let ext_mapping_idc = el_bit_depth_minus8 >> 8;
    let el_bit_depth_minus8 = el_bit_depth_minus8 & 0xff;

    if bl_bit_depth_minus8 > 8
        || el_bit_depth_minus8 > 8
        || vdr_bit_depth_minus8 > 8
        || ext_mapping_idc > 0xff
    {
        return decode_error("dovi: invalid bit depth");
    }

    hdr.bl_bit_depth = bl_bit_depth_minus8 as u8 + 8;
    hdr.el_bit_depth = el_bit_depth_minus8 as u8 + 8;
    hdr.vdr_bit_depth = vdr_bit_depth_minus8 as u8 + 8;
    hdr.ext_mapping_idc_0_4 = (ext_mapping_idc & 0x1f) as u8;
    hdr.ext_mapping_idc_5_7 = (ext_mapping_idc >> 5) as u8;

    hdr.spatial_resampling_filter_flag = bs.read_bit()?;

    if bs.read_bits_leq32(3)? != 0 && err_recognition.is_careful() {
        return rejected_error("dovi: reserved bits set");
    }

    hdr.el_spatial_resampling_filter_flag = bs.read_bit()?;
    hdr.disable_residual_flag = bs.read_bit()?;

    Ok(())
}

/// Reads one piece of a reshaping curve.
fn read_reshaping_piece(bs: &mut BitReaderLtr<'_>, hdr: &RpuDataHeader) -> Result<ReshapingPiece> {
    match bs.read_exp_golomb_unsigned()? {
        0 => {
            let order_minus1 = bs.read_exp_golomb_unsigned()?;

            if order_minus1 > 1 {
                return decode_error("dovi: invalid polynomial order");
            }

            if order_minus1 == 0 && bs.read_bit()? {
                return unsupported_error("dovi: linear interpolation");
            }

            let order = order_minus1 as u8 + 1;
            let mut coef = [0; 3];

            for c in coef.iter_mut().take(usize::from(order) + 1) {
                *c = read_se_coef(bs, hdr)?;
            }

            Ok(ReshapingPiece::Polynomial { order, coef })
        }
        1 => {
            let order_minus1 = bs.read_bits_leq32(2)?;

            if order_minus1 > 2 {
                return decode_error("dovi: invalid mmr order");
            }

            let order = order_minus1 as u8 + 1;
            let constant = read_se_coef(bs, hdr)?;
            let mut coef = [[0; 7]; 3];

            for row in coef.iter_mut().take(usize::from(order)) {
                for c in row.iter_mut() {
                    *c = read_se_coef(bs, hdr)?;
                }
            }

            Ok(ReshapingPiece::Mmr { order, constant, coef })
        }
        _ => decode_error("dovi: invalid mapping idc"),
    }
}

/// Reads a complete data mapping, starting after `vdr_rpu_id`.
fn read_data_mapping(
    bs: &mut BitReaderLtr<'_>,
    hdr: &RpuDataHeader,
    vdr_rpu_id: usize,
    use_nlq: bool,
) -> Result<DataMapping> {
    let mut mapping = DataMapping { vdr_rpu_id: vdr_rpu_id as u8, ..Default::default() };

    mapping.mapping_color_space = bs.read_exp_golomb_unsigned()? as u8;
    mapping.mapping_chroma_format_idc = bs.read_exp_golomb_unsigned()? as u8;

    let bl_bit_depth = u32::from(hdr.bl_bit_depth);

    for curve in mapping.curves.iter_mut() {
        let num_pivots_minus2 = bs.read_exp_golomb_unsigned()? as usize;

        if num_pivots_minus2 > DOVI_MAX_PIECES - 1 {
            return decode_error("dovi: too many pivots");
        }

        // Pivots are delta coded.
        let mut pivot = 0u32;

        for _ in 0..num_pivots_minus2 + 2 {
            pivot += bs.read_bits_leq32(bl_bit_depth)?;
            curve.pivots.push(pivot.min(u32::from(u16::MAX)) as u16);
        }
    }

    if use_nlq {
        if bs.read_bits_leq32(3)? != NlqMethod::LinearDeadzone as u32 {
            return decode_error("dovi: invalid nlq method");
        }

        let mut pivot = 0u32;

        for nlq_pivot in mapping.nlq_pivots.iter_mut() {
            pivot += bs.read_bits_leq32(bl_bit_depth)?;
            *nlq_pivot = pivot.min(u32::from(u16::MAX)) as u16;
        }

        mapping.nlq_method_idc = Some(NlqMethod::LinearDeadzone);
    }

    mapping.num_x_partitions = bs.read_exp_golomb_unsigned()? + 1;
    mapping.num_y_partitions = bs.read_exp_golomb_unsigned()? + 1;

    for curve in mapping.curves.iter_mut() {
        for _ in 1..curve.pivots.len() {
            curve.pieces.push(read_reshaping_piece(bs, hdr)?);
        }
    }

    if use_nlq {
        for nlq in mapping.nlq.iter_mut() {
            nlq.nlq_offset = bs.read_bits_leq32(u32::from(hdr.el_bit_depth))? as u16;
            nlq.vdr_in_max = read_ue_coef(bs, hdr)?;
            nlq.linear_deadzone_slope = read_ue_coef(bs, hdr)?;
            nlq.linear_deadzone_threshold = read_ue_coef(bs, hdr)?;
        }
    }

    Ok(mapping)
}

/// Reads the level 0 color metadata block.
fn read_color_metadata(bs: &mut BitReaderLtr<'_>, color: &mut ColorMetadata) -> Result<()> {
    for coef in color.ycc_to_rgb_matrix.iter_mut() {
        *coef = bs.read_bits_leq32_signed(16)? as i16;
    }

    for offset in color.ycc_to_rgb_offset.iter_mut() {
        *offset = bs.read_bits_leq32(32)?;
    }

    for coef in color.rgb_to_lms_matrix.iter_mut() {
        *coef = bs.read_bits_leq32_signed(16)? as i16;
    }

    color.signal_eotf = bs.read_bits_leq32(16)? as u16;
    color.signal_eotf_param0 = bs.read_bits_leq32(16)? as u16;
    color.signal_eotf_param1 = bs.read_bits_leq32(16)? as u16;
    color.signal_eotf_param2 = bs.read_bits_leq32(32)?;
    color.signal_bit_depth = bs.read_bits_leq32(5)? as u8;

    if color.signal_bit_depth < 8 || color.signal_bit_depth > 16 {
        return decode_error("dovi: invalid signal bit depth");
    }

    color.signal_color_space = bs.read_bits_leq32(2)? as u8;
    color.signal_chroma_format = bs.read_bits_leq32(2)? as u8;
    color.signal_full_range_flag = bs.read_bits_leq32(2)? as u8;
    color.source_min_pq = bs.read_bits_leq32(12)? as u16;
    color.source_max_pq = bs.read_bits_leq32(12)? as u16;
    color.source_diagonal = bs.read_bits_leq32(10)? as u16;

    Ok(())
}

impl DoviContext {
    /// Parses an RPU and updates the context with its contents.
    ///
    /// For profile 10 (AV1) streams, `rpu` is the EMDF container following the T.35 header.
    /// Otherwise, `rpu` is an unescaped NAL unit payload beginning with the `0x19` prefix.
    ///
    /// On error, the per-frame state of the context is flushed.
    pub fn parse(&mut self, rpu: &[u8], err_recognition: ErrorRecognition) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.rpu_buf);

        let result = self.parse_rpu(rpu, &mut scratch, err_recognition);

        self.rpu_buf = scratch;

        if result.is_err() {
            self.flush();
        }

        result
    }

    fn parse_rpu(
        &mut self,
        data: &[u8],
        scratch: &mut Vec<u8>,
        err_recognition: ErrorRecognition,
    ) -> Result<()> {
        let rpu = if self.cfg.dv_profile == 10 {
            read_emdf(data, scratch)?;
            &scratch[..]
        }
        else {
            strip_nal_prefix(data)?
        };

        verify_rpu(rpu, err_recognition, self.label())?;

        let mut bs = BitReaderLtr::new(rpu);

        let rpu_type = bs.read_bits_leq32(6)? as u8;

        if rpu_type != 2 {
            warn!("{}: unrecognized rpu type {}, ignoring", self.label(), rpu_type);
            return Ok(());
        }

        let mut hdr = RpuDataHeader { rpu_type, ..Default::default() };

        read_rpu_header(&mut bs, &mut hdr, err_recognition)?;

        let compression = self.cfg.dv_md_compression != DoviCompression::None;

        let vdr_dm_metadata_present = bs.read_bit()?;
        let use_prev_vdr_rpu = bs.read_bit()?;
        let dm_compression = compression && bs.read_bit()?;

        let use_nlq = !hdr.disable_residual_flag;

        let profile = match self.cfg.dv_profile {
            0 => guess_profile_hevc(&hdr),
            profile => profile,
        };

        if profile == 5 && use_nlq {
            error!("{}: profile 5 rpu uses nlq", self.label());
            return decode_error("dovi: profile 5 rpu uses nlq");
        }

        if err_recognition.is_careful() {
            if compression && profile < 8 {
                return rejected_error("dovi: profile does not permit metadata compression");
            }

            if use_prev_vdr_rpu && !compression {
                return rejected_error("dovi: rpu reuses a mapping without metadata compression");
            }
        }

        // Data mapping.
        let mapping_id = if use_prev_vdr_rpu {
            let mut id = read_dm_id(&mut bs)?;

            if self.vdr[id].is_none() {
                id = 0;
            }

            if self.vdr[id].is_none() {
                error!("{}: unknown previous rpu id {}", self.label(), id);
                return decode_error("dovi: unknown previous rpu id");
            }

            id
        }
        else {
            let id = read_dm_id(&mut bs)?;
            let mapping = read_data_mapping(&mut bs, &hdr, id, use_nlq)?;

            self.vdr[id] = Some(Arc::new(mapping));
            id
        };

        // Display management data.
        if vdr_dm_metadata_present {
            let affected_dm_id = read_dm_id(&mut bs)?;
            let current_dm_id = read_dm_id(&mut bs)?;

            if affected_dm_id != current_dm_id {
                return unsupported_error("dovi: mismatched affected and current dm ids");
            }

            let mut color = if dm_compression {
                match self.dm.as_deref() {
                    Some(dm) => dm.clone(),
                    None => return decode_error("dovi: compressed dm without previous dm"),
                }
            }
            else {
                ColorMetadata::default()
            };

            color.dm_metadata_id = affected_dm_id as u8;
            color.scene_refresh_flag = match u8::try_from(bs.read_exp_golomb_unsigned()?) {
                Ok(flag) => flag,
                Err(_) => return decode_error("dovi: invalid scene refresh flag"),
            };

            if !dm_compression {
                read_color_metadata(&mut bs, &mut color)?;
            }

            // Static blocks carry over from the previous RPU only if the DM is compressed.
            let mut ext = self.ext_blocks.as_deref().cloned().unwrap_or_default();

            if !dm_compression {
                ext.clear_static();
            }
            ext.clear_dynamic();

            self.read_ext_blocks(&mut bs, &mut ext, 1, dm_compression, err_recognition)?;

            // Padding, CRC, and terminator.
            if bs.bits_left() > 48 {
                self.read_ext_blocks(&mut bs, &mut ext, 2, dm_compression, err_recognition)?;
            }

            self.dm = Some(Arc::new(color));
            self.color = ColorView::Dm;
            self.ext_blocks = (!ext.is_empty()).then(|| Arc::new(ext));
        }
        else {
            self.color = ColorView::Default;
            self.ext_blocks = None;
        }

        self.header = hdr;
        self.mapping = Some(mapping_id);

        Ok(())
    }

    /// Reads a group of extension blocks into `ext`.
    fn read_ext_blocks(
        &self,
        bs: &mut BitReaderLtr<'_>,
        ext: &mut DoviExt,
        group: u8,
        dm_compression: bool,
        err_recognition: ErrorRecognition,
    ) -> Result<()> {
        let num_ext_blocks = bs.read_exp_golomb_unsigned()?;

        bs.realign();

        for _ in 0..num_ext_blocks {
            let length = u64::from(bs.read_exp_golomb_unsigned()?);
            let level = bs.read_bits_leq32(8)? as u8;

            if 8 * length > bs.bits_left() {
                return decode_error("dovi: extension block exceeds the rpu");
            }

            let is_static = extension_is_static(level);

            let skip = if is_static && dm_compression {
                warn!(
                    "{}: compressed dm contains static extension block level {}",
                    self.label(),
                    level
                );

                if err_recognition.is_aggressive() {
                    return decode_error("dovi: static extension block in compressed dm");
                }
                true
            }
            else if is_static && ext.num_static() >= DOVI_MAX_STATIC_EXT_BLOCKS {
                warn!("{}: too many static extension blocks", self.label());
                true
            }
            else if !is_static && ext.num_dynamic() >= DOVI_MAX_DYNAMIC_EXT_BLOCKS {
                warn!("{}: too many dynamic extension blocks", self.label());
                true
            }
            else {
                false
            };

            if skip {
                bs.ignore_bits(8 * length as u32)?;
                continue;
            }

            let bits_left = bs.bits_left();

            let block = match group {
                1 => read_ext_block_v1(bs, level)?,
                _ => read_ext_block_v2(bs, level, length)?,
            };

            let parsed = bits_left - bs.bits_left();

            if parsed > 8 * length {
                return decode_error("dovi: extension block overrun");
            }

            bs.ignore_bits((8 * length - parsed) as u32)?;

            match block {
                Some(block) => ext.push(block)?,
                None => warn!("{}: unknown dm v{} extension block level {}", self.label(), group, level),
            }
        }

        Ok(())
    }
}
