// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use log::trace;

use lumen_core::errors::{decode_error, invalid_argument_error, unsupported_error, Result};
use lumen_core::io::BitWriterLtr;
use lumen_core::video::dovi::*;

use crate::container::{finish_rpu, wrap_nal, wrap_t35};
use crate::context::{ColorView, DoviContext, DoviExt};
use crate::ext::write_ext_block;
use crate::{extension_is_static, GenerateFlags, COLOR_DEFAULT, DOVI_MAX_DM_ID};

/// The decisions made while writing an RPU, applied to the context once the RPU is complete.
struct PendingState {
    vdr_rpu_id: usize,
    use_prev_vdr_rpu: bool,
    keep_other_slots: bool,
    vdr_dm_metadata_present: bool,
    ext: DoviExt,
}

fn write_se_coef(bw: &mut BitWriterLtr, hdr: &RpuDataHeader, coef: i64) -> Result<()> {
    let denom = u32::from(hdr.coef_log2_denom);

    if hdr.coef_data_type == RPU_COEFF_FIXED {
        let ipart = match i32::try_from(coef >> denom) {
            Ok(ipart) if ipart != i32::MIN => ipart,
            _ => return invalid_argument_error("dovi: reshaping coefficient out of range"),
        };

        bw.write_exp_golomb_signed(ipart);
        bw.write_bits_leq64((coef & ((1 << denom) - 1)) as u64, denom);
    }
    else {
        let value = (coef as f64 / (1u64 << denom) as f64) as f32;
        bw.write_bits_leq32(value.to_bits(), 32);
    }

    Ok(())
}

fn write_ue_coef(bw: &mut BitWriterLtr, hdr: &RpuDataHeader, coef: u64) -> Result<()> {
    let denom = u32::from(hdr.coef_log2_denom);

    if hdr.coef_data_type == RPU_COEFF_FIXED {
        let ipart = match u32::try_from(coef >> denom) {
            Ok(ipart) if ipart != u32::MAX => ipart,
            _ => return invalid_argument_error("dovi: nlq coefficient out of range"),
        };

        bw.write_exp_golomb_unsigned(ipart);
        bw.write_bits_leq64(coef & ((1 << denom) - 1), denom);
    }
    else {
        let value = (coef as f64 / (1u64 << denom) as f64) as f32;
        bw.write_bits_leq32(value.to_bits(), 32);
    }

    Ok(())
}

/// Writes a sequence of non-decreasing values as `width`-bit deltas.
fn write_deltas(bw: &mut BitWriterLtr, values: &[u16], width: u32) -> Result<()> {
    let mut prev = 0;

    for &value in values {
        if value < prev || u32::from(value - prev) >= 1 << width {
            return invalid_argument_error("dovi: invalid pivots");
        }

        bw.write_bits_leq32(u32::from(value - prev), width);
        prev = value;
    }

    Ok(())
}

/// Writes the level 0 color metadata block.
pub(crate) fn write_color_metadata(bw: &mut BitWriterLtr, color: &ColorMetadata) {
    for &coef in color.ycc_to_rgb_matrix.iter() {
        bw.write_bits_leq32_signed(i32::from(coef), 16);
    }

    for &offset in color.ycc_to_rgb_offset.iter() {
        bw.write_bits_leq32(offset, 32);
    }

    for &coef in color.rgb_to_lms_matrix.iter() {
        bw.write_bits_leq32_signed(i32::from(coef), 16);
    }

    bw.write_bits_leq32(u32::from(color.signal_eotf), 16);
    bw.write_bits_leq32(u32::from(color.signal_eotf_param0), 16);
    bw.write_bits_leq32(u32::from(color.signal_eotf_param1), 16);
    bw.write_bits_leq32(color.signal_eotf_param2, 32);
    bw.write_bits_leq32(u32::from(color.signal_bit_depth), 5);
    bw.write_bits_leq32(u32::from(color.signal_color_space), 2);
    bw.write_bits_leq32(u32::from(color.signal_chroma_format), 2);
    bw.write_bits_leq32(u32::from(color.signal_full_range_flag), 2);
    bw.write_bits_leq32(u32::from(color.source_min_pq), 12);
    bw.write_bits_leq32(u32::from(color.source_max_pq), 12);
    bw.write_bits_leq32(u32::from(color.source_diagonal), 10);
}

fn validate_header(hdr: &RpuDataHeader) -> Result<()> {
    if hdr.rpu_format & 0x700 != 0 || hdr.rpu_format > 0x7ff {
        return unsupported_error("dovi: unsupported rpu format");
    }

    for depth in [hdr.bl_bit_depth, hdr.el_bit_depth, hdr.vdr_bit_depth] {
        if depth < 8 || depth > 16 {
            return invalid_argument_error("dovi: invalid bit depth");
        }
    }

    match hdr.coef_data_type {
        RPU_COEFF_FIXED if hdr.coef_log2_denom < 13 || hdr.coef_log2_denom > 32 => {
            invalid_argument_error("dovi: invalid coef_log2_denom")
        }
        RPU_COEFF_FIXED => Ok(()),
        RPU_COEFF_FLOAT if hdr.coef_log2_denom != 32 => {
            invalid_argument_error("dovi: invalid coef_log2_denom")
        }
        RPU_COEFF_FLOAT => Ok(()),
        _ => invalid_argument_error("dovi: invalid coef_data_type"),
    }
}

fn validate_mapping(mapping: &DataMapping, use_nlq: bool) -> Result<()> {
    if usize::from(mapping.vdr_rpu_id) > DOVI_MAX_DM_ID {
        return invalid_argument_error("dovi: invalid vdr_rpu_id");
    }

    for curve in mapping.curves.iter() {
        let num_pivots = curve.pivots.len();

        if num_pivots < 2 || num_pivots > DOVI_MAX_PIVOTS || curve.pieces.len() != num_pivots - 1 {
            return invalid_argument_error("dovi: invalid reshaping curve");
        }

        for piece in curve.pieces.iter() {
            let valid = match *piece {
                ReshapingPiece::Polynomial { order, .. } => order == 1 || order == 2,
                ReshapingPiece::Mmr { order, .. } => order >= 1 && order <= 3,
            };

            if !valid {
                return invalid_argument_error("dovi: invalid reshaping piece order");
            }
        }
    }

    if mapping.num_x_partitions == 0 || mapping.num_y_partitions == 0 {
        return invalid_argument_error("dovi: invalid number of partitions");
    }

    if mapping.nlq_method_idc.is_some() != use_nlq {
        return invalid_argument_error("dovi: nlq method does not match the header");
    }

    Ok(())
}

fn write_data_mapping(bw: &mut BitWriterLtr, hdr: &RpuDataHeader, mapping: &DataMapping) -> Result<()> {
    let bl_bit_depth = u32::from(hdr.bl_bit_depth);

    bw.write_exp_golomb_unsigned(u32::from(mapping.mapping_color_space));
    bw.write_exp_golomb_unsigned(u32::from(mapping.mapping_chroma_format_idc));

    for curve in mapping.curves.iter() {
        bw.write_exp_golomb_unsigned(curve.pivots.len() as u32 - 2);
        write_deltas(bw, &curve.pivots, bl_bit_depth)?;
    }

    if let Some(method) = mapping.nlq_method_idc {
        bw.write_bits_leq32(method as u32, 3);
        write_deltas(bw, &mapping.nlq_pivots, bl_bit_depth)?;
    }

    bw.write_exp_golomb_unsigned(mapping.num_x_partitions - 1);
    bw.write_exp_golomb_unsigned(mapping.num_y_partitions - 1);

    for curve in mapping.curves.iter() {
        for piece in curve.pieces.iter() {
            match piece {
                ReshapingPiece::Polynomial { order, coef } => {
                    bw.write_exp_golomb_unsigned(0);
                    bw.write_exp_golomb_unsigned(u32::from(*order) - 1);

                    if *order == 1 {
                        // linear_interp_flag
                        bw.write_bit(false);
                    }

                    for &c in coef.iter().take(usize::from(*order) + 1) {
                        write_se_coef(bw, hdr, c)?;
                    }
                }
                ReshapingPiece::Mmr { order, constant, coef } => {
                    bw.write_exp_golomb_unsigned(1);
                    bw.write_bits_leq32(u32::from(*order) - 1, 2);
                    write_se_coef(bw, hdr, *constant)?;

                    for row in coef.iter().take(usize::from(*order)) {
                        for &c in row.iter() {
                            write_se_coef(bw, hdr, c)?;
                        }
                    }
                }
            }
        }
    }

    if mapping.nlq_method_idc.is_some() {
        let el_bit_depth = u32::from(hdr.el_bit_depth);

        for nlq in mapping.nlq.iter() {
            if u32::from(nlq.nlq_offset) >= 1 << el_bit_depth {
                return invalid_argument_error("dovi: invalid nlq offset");
            }

            bw.write_bits_leq32(u32::from(nlq.nlq_offset), el_bit_depth);
            write_ue_coef(bw, hdr, nlq.vdr_in_max)?;
            write_ue_coef(bw, hdr, nlq.linear_deadzone_slope)?;
            write_ue_coef(bw, hdr, nlq.linear_deadzone_threshold)?;
        }
    }

    Ok(())
}

impl DoviContext {
    /// Synthesizes an RPU from `metadata`, and records what was written so that following RPUs
    /// may omit unchanged data.
    ///
    /// The context must be configured with a profile, see [`DoviContext::configure_ext`]. Returns
    /// an empty buffer if there is no metadata.
    pub fn generate(
        &mut self,
        metadata: Option<&DoviMetadata>,
        flags: GenerateFlags,
    ) -> Result<Vec<u8>> {
        let metadata = match metadata {
            Some(metadata) => metadata,
            None => return Ok(Vec::new()),
        };

        let mut bw = BitWriterLtr::from_vec(std::mem::take(&mut self.rpu_buf));

        let result = self.write_rpu(&mut bw, metadata, flags);

        let mut rpu = bw.into_bytes();

        let pending = match result {
            Ok(pending) => pending,
            Err(err) => {
                self.rpu_buf = rpu;
                return Err(err);
            }
        };

        finish_rpu(&mut rpu);

        let out = if flags.contains(GenerateFlags::WRAP_T35) {
            match wrap_t35(&rpu) {
                Ok(out) => Some(out),
                Err(err) => {
                    self.rpu_buf = rpu;
                    return Err(err);
                }
            }
        }
        else if flags.contains(GenerateFlags::WRAP_NAL) {
            Some(wrap_nal(&rpu))
        }
        else {
            None
        };

        trace!("{}: generated rpu of {} bytes", self.label(), rpu.len());

        self.commit(metadata, pending);

        match out {
            Some(out) => {
                self.rpu_buf = rpu;
                Ok(out)
            }
            None => Ok(rpu),
        }
    }

    fn write_rpu(
        &self,
        bw: &mut BitWriterLtr,
        metadata: &DoviMetadata,
        flags: GenerateFlags,
    ) -> Result<PendingState> {
        if self.cfg.dv_profile == 0 {
            return invalid_argument_error("dovi: no profile configured");
        }

        let hdr = &metadata.header;
        let mapping = &metadata.mapping;
        let color = &metadata.color;

        if hdr.rpu_type != 2 {
            return decode_error("dovi: unsupported rpu type");
        }

        validate_header(hdr)?;
        validate_mapping(mapping, !hdr.disable_residual_flag)?;

        if usize::from(color.dm_metadata_id) > DOVI_MAX_DM_ID {
            return invalid_argument_error("dovi: invalid dm_metadata_id");
        }

        let mut ext = DoviExt::default();

        for block in metadata.ext_blocks.iter() {
            ext.push(*block)?;
        }

        if self.cfg.dv_md_compression == DoviCompression::Reserved {
            return invalid_argument_error("dovi: reserved metadata compression");
        }

        let compression = if flags.contains(GenerateFlags::COMPRESS_RPU) {
            self.cfg.dv_md_compression
        }
        else {
            DoviCompression::None
        };

        let vdr_rpu_id = usize::from(mapping.vdr_rpu_id);
        let same_mapping = self.vdr[vdr_rpu_id].as_deref() == Some(mapping);

        let use_prev_vdr_rpu = match compression {
            DoviCompression::Limited => vdr_rpu_id == 0 && same_mapping,
            DoviCompression::Extended => same_mapping,
            _ => false,
        };

        let vdr_dm_metadata_present = *color != COLOR_DEFAULT || !ext.is_empty();

        let prev_static = self.ext_blocks.as_deref().map_or(&[][..], |prev| prev.static_blocks());

        let dm_compression = vdr_dm_metadata_present
            && compression != DoviCompression::None
            && self.dm.as_deref().is_some_and(|dm| dm.same_color_as(color))
            && prev_static == ext.static_blocks();

        if vdr_dm_metadata_present
            && !dm_compression
            && (color.signal_bit_depth < 8 || color.signal_bit_depth > 16)
        {
            return invalid_argument_error("dovi: invalid signal bit depth");
        }

        // rpu_data_header()
        bw.write_bits_leq32(u32::from(hdr.rpu_type), 6);
        bw.write_bits_leq32(u32::from(hdr.rpu_format), 11);
        bw.write_bits_leq32(u32::from(hdr.vdr_rpu_profile), 4);
        bw.write_bits_leq32(u32::from(hdr.vdr_rpu_level), 4);
        // vdr_seq_info_present_flag
        bw.write_bit(true);
        bw.write_bit(hdr.chroma_resampling_explicit_filter_flag);
        bw.write_bits_leq32(u32::from(hdr.coef_data_type), 2);

        if hdr.coef_data_type == RPU_COEFF_FIXED {
            bw.write_exp_golomb_unsigned(u32::from(hdr.coef_log2_denom));
        }

        bw.write_bits_leq32(u32::from(hdr.vdr_rpu_normalized_idc), 2);
        bw.write_bit(hdr.bl_video_full_range_flag);

        let ext_mapping_idc =
            u32::from(hdr.ext_mapping_idc_5_7 & 0x7) << 5 | u32::from(hdr.ext_mapping_idc_0_4 & 0x1f);

        bw.write_exp_golomb_unsigned(u32::from(hdr.bl_bit_depth) - 8);
        bw.write_exp_golomb_unsigned(ext_mapping_idc << 8 | (u32::from(hdr.el_bit_depth) - 8));
        bw.write_exp_golomb_unsigned(u32::from(hdr.vdr_bit_depth) - 8);
        bw.write_bit(hdr.spatial_resampling_filter_flag);
        // reserved_zero_3bits
        bw.write_bits_leq32(0, 3);
        bw.write_bit(hdr.el_spatial_resampling_filter_flag);
        bw.write_bit(hdr.disable_residual_flag);

        bw.write_bit(vdr_dm_metadata_present);
        bw.write_bit(use_prev_vdr_rpu);

        if self.cfg.dv_md_compression != DoviCompression::None {
            bw.write_bit(dm_compression);
        }

        // vdr_rpu_data_payload()
        bw.write_exp_golomb_unsigned(vdr_rpu_id as u32);

        if !use_prev_vdr_rpu {
            write_data_mapping(bw, hdr, mapping)?;
        }

        // vdr_dm_data_payload()
        if vdr_dm_metadata_present {
            let dm_id = u32::from(color.dm_metadata_id);

            bw.write_exp_golomb_unsigned(dm_id);
            bw.write_exp_golomb_unsigned(dm_id);
            bw.write_exp_golomb_unsigned(u32::from(color.scene_refresh_flag));

            if !dm_compression {
                write_color_metadata(bw, color);
            }

            let is_sent = |block: &&DmData| !(dm_compression && extension_is_static(block.level()));

            let v1: Vec<&DmData> = ext.iter().filter(|b| !b.is_cm_v4()).filter(is_sent).collect();
            let v2: Vec<&DmData> = ext.iter().filter(|b| b.is_cm_v4()).filter(is_sent).collect();

            bw.write_exp_golomb_unsigned(v1.len() as u32);
            bw.realign();

            for block in v1 {
                write_ext_block(bw, block);
            }

            if !v2.is_empty() {
                bw.write_exp_golomb_unsigned(v2.len() as u32);
                bw.realign();

                for block in v2 {
                    write_ext_block(bw, block);
                }
            }
        }

        bw.realign();

        Ok(PendingState {
            vdr_rpu_id,
            use_prev_vdr_rpu,
            keep_other_slots: compression == DoviCompression::Extended,
            vdr_dm_metadata_present,
            ext,
        })
    }

    /// Records a generated RPU as the reference for the next one.
    fn commit(&mut self, metadata: &DoviMetadata, pending: PendingState) {
        let id = pending.vdr_rpu_id;

        self.header = metadata.header.clone();

        if !pending.use_prev_vdr_rpu {
            self.vdr[id] = Some(Arc::new(metadata.mapping.clone()));
        }

        if !pending.keep_other_slots {
            for (i, slot) in self.vdr.iter_mut().enumerate() {
                if i != id {
                    *slot = None;
                }
            }
        }

        self.mapping = Some(id);

        if pending.vdr_dm_metadata_present {
            self.dm = Some(Arc::new(metadata.color.clone()));
            self.color = ColorView::Dm;
            self.ext_blocks = (!pending.ext.is_empty()).then(|| Arc::new(pending.ext));
        }
        else {
            self.color = ColorView::Default;
            self.ext_blocks = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use smallvec::smallvec;

    use lumen_core::codecs::ErrorRecognition;
    use lumen_core::errors::Error;

    use crate::container::{unwrap_nal, unwrap_t35};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Debug).try_init();
    }

    const STRICT: ErrorRecognition = ErrorRecognition::CRCCHECK
        .union(ErrorRecognition::EXPLODE)
        .union(ErrorRecognition::COMPLIANT);

    fn header(disable_residual: bool) -> RpuDataHeader {
        RpuDataHeader {
            rpu_type: 2,
            rpu_format: 18,
            vdr_rpu_profile: 1,
            vdr_rpu_level: 0,
            coef_data_type: RPU_COEFF_FIXED,
            coef_log2_denom: 23,
            vdr_rpu_normalized_idc: 1,
            bl_bit_depth: 10,
            el_bit_depth: 10,
            vdr_bit_depth: 12,
            disable_residual_flag: disable_residual,
            ..Default::default()
        }
    }

    fn curve(pivots: &[u16], piece: ReshapingPiece) -> ReshapingCurve {
        ReshapingCurve {
            pivots: pivots.iter().copied().collect(),
            pieces: std::iter::repeat(piece).take(pivots.len() - 1).collect(),
        }
    }

    fn metadata(vdr_rpu_id: u8) -> DoviMetadata {
        let poly = ReshapingPiece::Polynomial { order: 2, coef: [-12345, 1 << 23, -(3 << 20)] };

        let mut mmr_coef = [[0; 7]; 3];
        mmr_coef[0] = [1 << 22, -(1 << 21), 77, -78, 0, 1, -1];
        mmr_coef[1] = [5, 6, 7, 8, 9, 10, 11];
        let mmr = ReshapingPiece::Mmr { order: 2, constant: -(1 << 24), coef: mmr_coef };

        DoviMetadata {
            header: header(true),
            mapping: DataMapping {
                vdr_rpu_id,
                curves: [
                    curve(&[0, 128, 256, 512, 1023], poly),
                    curve(&[0, 1023], mmr),
                    curve(&[64, 940], ReshapingPiece::Polynomial { order: 1, coef: [7, 9, 0] }),
                ],
                num_x_partitions: 1,
                num_y_partitions: 1,
                ..Default::default()
            },
            color: ColorMetadata { source_max_pq: 3079, source_diagonal: 42, ..COLOR_DEFAULT },
            ext_blocks: vec![
                DmData::Level6(DmLevel6 {
                    max_luminance: 1000,
                    min_luminance: 50,
                    max_cll: 1000,
                    max_fall: 400,
                }),
                DmData::Level254(DmLevel254 { dm_mode: 0, dm_version_index: 2 }),
                DmData::Level1(DmLevel1 { min_pq: 0, max_pq: 2081, avg_pq: 1003 }),
                DmData::Level2(DmLevel2 {
                    target_max_pq: 2851,
                    trim_slope: 2048,
                    trim_offset: 2048,
                    trim_power: 2048,
                    trim_chroma_weight: 2048,
                    trim_saturation_gain: 2048,
                    ms_weight: -1,
                }),
                DmData::Level3(DmLevel3 { min_pq_offset: 2048, max_pq_offset: 2048, avg_pq_offset: 2048 }),
                DmData::Level8(DmLevel8 { target_display_index: 1, trim_slope: 2048, ..Default::default() }),
                DmData::Level9(DmLevel9 { source_primary_index: 0, ..Default::default() }),
                DmData::Level11(DmLevel11 { content_type: 1, whitepoint: 0, reference_mode_flag: true, ..Default::default() }),
            ],
        }
    }

    fn context(profile: u8, compression: DoviCompression) -> DoviContext {
        let mut ctx = DoviContext::new("test");
        ctx.cfg.dv_version_major = 1;
        ctx.cfg.dv_profile = profile;
        ctx.cfg.dv_level = 6;
        ctx.cfg.rpu_present_flag = true;
        ctx.cfg.bl_present_flag = true;
        ctx.cfg.dv_bl_signal_compatibility_id = 1;
        ctx.cfg.dv_md_compression = compression;
        ctx
    }

    #[test]
    fn verify_generate_nal_roundtrip() {
        init_logger();

        let src = metadata(0);

        let mut enc = context(8, DoviCompression::None);
        let nal = enc.generate(Some(&src), GenerateFlags::WRAP_NAL).unwrap();
        assert_eq!(nal[0], 0x19);

        let mut dec = context(8, DoviCompression::None);
        dec.parse(&unwrap_nal(&nal), STRICT).unwrap();

        assert_eq!(dec.get_metadata(), Some(src.clone()));

        // The generating context describes the same metadata.
        assert_eq!(enc.get_metadata(), Some(src));
    }

    #[test]
    fn verify_generate_raw_and_t35() {
        init_logger();

        let src = metadata(3);

        let mut enc = context(8, DoviCompression::None);
        let raw = enc.generate(Some(&src), GenerateFlags::empty()).unwrap();
        assert_eq!(raw.last(), Some(&0x80));
        assert_ne!(raw[0], 0x19);

        // WRAP_T35 takes precedence over WRAP_NAL.
        let mut enc = context(10, DoviCompression::None);
        let t35 = enc.generate(Some(&src), GenerateFlags::WRAP_T35 | GenerateFlags::WRAP_NAL).unwrap();
        assert_eq!(&t35[..3], &[0xb5, 0x00, 0x3b]);
        assert!(enc.rpu_buf_capacity() >= raw.len());

        let mut dec = context(10, DoviCompression::None);
        dec.parse(unwrap_t35(&t35).unwrap(), STRICT).unwrap();
        assert_eq!(dec.get_metadata(), Some(src));
    }

    #[test]
    fn verify_generate_reexport() {
        init_logger();

        let mut enc = context(8, DoviCompression::None);
        let first = enc.generate(Some(&metadata(0)), GenerateFlags::WRAP_NAL).unwrap();

        let mut dec = context(8, DoviCompression::None);
        dec.parse(&unwrap_nal(&first), STRICT).unwrap();

        // Exporting, regenerating, and parsing again yields the same metadata.
        let exported = dec.get_metadata().unwrap();

        let mut enc = context(8, DoviCompression::None);
        let second = enc.generate(Some(&exported), GenerateFlags::WRAP_NAL).unwrap();
        assert_eq!(first, second);

        let mut dec2 = context(8, DoviCompression::None);
        dec2.parse(&unwrap_nal(&second), STRICT).unwrap();
        assert_eq!(dec2.get_metadata(), Some(exported));
    }

    #[test]
    fn verify_generate_compression() {
        init_logger();

        let src = metadata(0);

        let mut enc = context(8, DoviCompression::Limited);
        let mut dec = context(8, DoviCompression::Limited);

        let flags = GenerateFlags::WRAP_NAL | GenerateFlags::COMPRESS_RPU;

        let first = enc.generate(Some(&src), flags).unwrap();
        let second = enc.generate(Some(&src), flags).unwrap();
        assert!(second.len() < first.len());

        dec.parse(&unwrap_nal(&first), STRICT).unwrap();
        assert_eq!(dec.get_metadata().as_ref(), Some(&src));

        dec.parse(&unwrap_nal(&second), STRICT).unwrap();
        assert_eq!(dec.get_metadata().as_ref(), Some(&src));

        // Changing a dynamic block keeps the mapping and level 0 block compressed.
        let mut changed = src.clone();
        changed.ext_blocks[2] = DmData::Level1(DmLevel1 { min_pq: 1, max_pq: 1000, avg_pq: 500 });

        let third = enc.generate(Some(&changed), flags).unwrap();
        assert!(third.len() < first.len());

        dec.parse(&unwrap_nal(&third), STRICT).unwrap();
        assert_eq!(dec.get_metadata(), Some(changed));

        // Without the flag, nothing is omitted.
        let full = enc.generate(Some(&src), GenerateFlags::WRAP_NAL).unwrap();
        assert_eq!(full, first);
    }

    #[test]
    fn verify_generate_limited_compression_slots() {
        init_logger();

        let flags = GenerateFlags::COMPRESS_RPU;
        let no_dm = DoviMetadata { color: COLOR_DEFAULT, ext_blocks: Vec::new(), ..metadata(2) };

        // Limited compression only reuses slot 0.
        let mut enc = context(8, DoviCompression::Limited);
        let first = enc.generate(Some(&no_dm), flags).unwrap();
        let second = enc.generate(Some(&no_dm), flags).unwrap();
        assert_eq!(first, second);

        // Extended compression reuses any slot, and keeps every slot.
        let mut enc = context(8, DoviCompression::Extended);
        let first = enc.generate(Some(&metadata(2)), flags).unwrap();
        enc.generate(Some(&metadata(5)), flags).unwrap();
        assert!(enc.vdr(2).is_some());

        let third = enc.generate(Some(&metadata(2)), flags).unwrap();
        assert!(third.len() < first.len());

        // Otherwise, only the current slot is kept.
        let mut enc = context(8, DoviCompression::Limited);
        enc.generate(Some(&metadata(2)), flags).unwrap();
        enc.generate(Some(&metadata(5)), flags).unwrap();
        assert!(enc.vdr(2).is_none());
        assert!(enc.vdr(5).is_some());
    }

    #[test]
    fn verify_generate_without_dm() {
        let src = DoviMetadata { color: COLOR_DEFAULT, ext_blocks: Vec::new(), ..metadata(0) };

        let mut enc = context(8, DoviCompression::None);
        let rpu = enc.generate(Some(&src), GenerateFlags::WRAP_NAL).unwrap();
        assert!(enc.ext_blocks().is_none());
        assert_eq!(enc.color(), Some(&COLOR_DEFAULT));

        let mut dec = context(8, DoviCompression::None);
        dec.parse(&unwrap_nal(&rpu), STRICT).unwrap();
        assert_eq!(dec.get_metadata(), Some(src));
    }

    #[test]
    fn verify_generate_nlq() {
        let mut src = metadata(0);
        src.header = header(false);
        src.mapping.nlq_method_idc = Some(NlqMethod::LinearDeadzone);
        src.mapping.nlq_pivots = [0, 1023];
        src.mapping.nlq = [NlqParams {
            nlq_offset: 512,
            vdr_in_max: 3 << 22,
            linear_deadzone_slope: 1 << 21,
            linear_deadzone_threshold: 1,
        }; 3];

        let mut enc = context(7, DoviCompression::None);
        let rpu = enc.generate(Some(&src), GenerateFlags::WRAP_NAL).unwrap();

        let mut dec = context(7, DoviCompression::None);
        dec.parse(&unwrap_nal(&rpu), STRICT).unwrap();
        assert_eq!(dec.get_metadata(), Some(src.clone()));

        // The residual must be described if, and only if, it is enabled.
        src.mapping.nlq_method_idc = None;
        assert!(enc.generate(Some(&src), GenerateFlags::empty()).is_err());
    }

    #[test]
    fn verify_generate_random_coefficients() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_d0b1);

        for _ in 0..32 {
            let mut src = metadata(rng.random_range(0..=15));

            for curve in src.mapping.curves.iter_mut() {
                for piece in curve.pieces.iter_mut() {
                    let coef: [i64; 3] = std::array::from_fn(|_| rng.random_range(-(1 << 40)..(1 << 40)));
                    *piece = ReshapingPiece::Polynomial { order: 2, coef };
                }
            }

            let mut enc = context(8, DoviCompression::None);
            let rpu = enc.generate(Some(&src), GenerateFlags::WRAP_NAL).unwrap();

            let mut dec = context(8, DoviCompression::None);
            dec.parse(&unwrap_nal(&rpu), STRICT).unwrap();
            assert_eq!(dec.get_metadata(), Some(src));
        }
    }

    #[test]
    fn verify_generate_errors() {
        let src = metadata(0);

        // No metadata, no output.
        let mut enc = context(8, DoviCompression::None);
        assert!(enc.generate(None, GenerateFlags::WRAP_NAL).unwrap().is_empty());

        // Not configured.
        let mut enc = DoviContext::default();
        assert!(matches!(
            enc.generate(Some(&src), GenerateFlags::empty()),
            Err(Error::InvalidArgument(_))
        ));

        let mut enc = context(8, DoviCompression::None);

        let mut bad = src.clone();
        bad.header.rpu_type = 3;
        assert!(matches!(enc.generate(Some(&bad), GenerateFlags::empty()), Err(Error::DecodeError(_))));

        let mut bad = src.clone();
        bad.header.rpu_format = 0x100;
        assert!(matches!(enc.generate(Some(&bad), GenerateFlags::empty()), Err(Error::Unsupported(_))));

        let mut bad = src.clone();
        bad.header.bl_bit_depth = 17;
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.header.coef_log2_denom = 12;
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.mapping.vdr_rpu_id = 16;
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.mapping.curves[0].pivots = smallvec![0];
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.mapping.curves[1].pivots = smallvec![1023, 0];
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.mapping.num_x_partitions = 0;
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.mapping.curves[2].pieces[0] = ReshapingPiece::Polynomial { order: 1, coef: [1 << 60, 0, 0] };
        assert!(enc.generate(Some(&bad), GenerateFlags::empty()).is_err());

        let mut bad = src.clone();
        bad.ext_blocks = vec![DmData::Level6(DmLevel6::default()); 8];
        assert!(matches!(enc.generate(Some(&bad), GenerateFlags::empty()), Err(Error::LimitError(_))));

        // Failures leave the context untouched.
        assert!(enc.mapping().is_none());

        let mut enc = context(8, DoviCompression::Reserved);
        assert!(matches!(
            enc.generate(Some(&src), GenerateFlags::COMPRESS_RPU),
            Err(Error::InvalidArgument(_))
        ));
    }
}
