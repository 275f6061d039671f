// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dolby Vision dynamic metadata.
//!
//! These types describe the content of a Dolby Vision reference processing unit (RPU) after it has
//! been parsed: the RPU data header, the reshaping (data mapping) of the base layer, the level 0
//! display management (color) metadata, and the display management extension blocks.

use smallvec::SmallVec;

/// Coefficients are coded as fixed-point integers.
pub const RPU_COEFF_FIXED: u8 = 0;
/// Coefficients are coded as IEEE-754 binary32 floats.
pub const RPU_COEFF_FLOAT: u8 = 1;

/// The maximum number of pivots in a reshaping curve.
pub const DOVI_MAX_PIVOTS: usize = 9;
/// The maximum number of pieces in a reshaping curve.
pub const DOVI_MAX_PIECES: usize = DOVI_MAX_PIVOTS - 1;

/// Denominator of the fixed-point `ycc_to_rgb_matrix` coefficients.
pub const YCC_TO_RGB_MATRIX_DENOM: i32 = 1 << 13;
/// Denominator of the fixed-point `rgb_to_lms_matrix` coefficients.
pub const RGB_TO_LMS_MATRIX_DENOM: i32 = 1 << 14;

/// Dolby Vision metadata compression, as signalled by the decoder configuration record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DoviCompression {
    /// No compression. Every RPU is self-contained.
    #[default]
    None = 0,
    /// Only the first data mapping slot may be reused between RPUs.
    Limited = 1,
    Reserved = 2,
    /// Any data mapping slot may be reused between RPUs.
    Extended = 3,
}

impl DoviCompression {
    /// Maps the 2-bit `dv_md_compression` field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => DoviCompression::None,
            1 => DoviCompression::Limited,
            2 => DoviCompression::Reserved,
            _ => DoviCompression::Extended,
        }
    }
}

/// The RPU data header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RpuDataHeader {
    /// The RPU type. Only type 2 is defined.
    pub rpu_type: u8,
    /// The 11-bit RPU format.
    pub rpu_format: u16,
    pub vdr_rpu_profile: u8,
    pub vdr_rpu_level: u8,
    pub chroma_resampling_explicit_filter_flag: bool,
    /// [`RPU_COEFF_FIXED`] or [`RPU_COEFF_FLOAT`].
    pub coef_data_type: u8,
    /// The number of fractional bits of every reshaping coefficient.
    pub coef_log2_denom: u8,
    pub vdr_rpu_normalized_idc: u8,
    pub bl_video_full_range_flag: bool,
    /// Base layer bit depth, 8 to 16.
    pub bl_bit_depth: u8,
    /// Enhancement layer bit depth, 8 to 16.
    pub el_bit_depth: u8,
    /// Output (VDR) bit depth, 8 to 16.
    pub vdr_bit_depth: u8,
    pub spatial_resampling_filter_flag: bool,
    pub el_spatial_resampling_filter_flag: bool,
    pub disable_residual_flag: bool,
    pub ext_mapping_idc_0_4: u8,
    pub ext_mapping_idc_5_7: u8,
}

/// The coefficients of one piece of a reshaping curve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReshapingPiece {
    /// A polynomial of order 1 or 2. Unused coefficients are 0.
    Polynomial { order: u8, coef: [i64; 3] },
    /// A multivariate multiple regression of order 1 to 3. Unused coefficients are 0.
    Mmr { order: u8, constant: i64, coef: [[i64; 7]; 3] },
}

impl Default for ReshapingPiece {
    fn default() -> Self {
        ReshapingPiece::Polynomial { order: 1, coef: [0; 3] }
    }
}

/// A piecewise reshaping curve of a single color component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReshapingCurve {
    /// The pivots, in base layer codewords. Between 2 and 9 pivots.
    pub pivots: SmallVec<[u16; DOVI_MAX_PIVOTS]>,
    /// One piece between every pair of adjacent pivots.
    pub pieces: SmallVec<[ReshapingPiece; DOVI_MAX_PIECES]>,
}

/// Non-linear inverse quantization method of the enhancement layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NlqMethod {
    LinearDeadzone = 0,
}

/// Non-linear inverse quantization parameters of a single color component.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NlqParams {
    pub nlq_offset: u16,
    pub vdr_in_max: u64,
    pub linear_deadzone_slope: u64,
    pub linear_deadzone_threshold: u64,
}

/// The base and enhancement layer mapping of an RPU.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataMapping {
    /// The mapping slot, 0 to 15.
    pub vdr_rpu_id: u8,
    pub mapping_color_space: u8,
    pub mapping_chroma_format_idc: u8,
    pub curves: [ReshapingCurve; 3],
    /// The enhancement layer quantization method, or `None` if there is no residual.
    pub nlq_method_idc: Option<NlqMethod>,
    pub num_x_partitions: u32,
    pub num_y_partitions: u32,
    pub nlq: [NlqParams; 3],
    pub nlq_pivots: [u16; 2],
}

/// Level 0 display management metadata: the color description of the source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorMetadata {
    pub dm_metadata_id: u8,
    pub scene_refresh_flag: u8,
    /// YCbCr to RGB matrix, in units of 1 / [`YCC_TO_RGB_MATRIX_DENOM`].
    pub ycc_to_rgb_matrix: [i16; 9],
    /// YCbCr offsets, in units of 2^-28 (2^-30 for profile 4).
    pub ycc_to_rgb_offset: [u32; 3],
    /// RGB to LMS matrix, in units of 1 / [`RGB_TO_LMS_MATRIX_DENOM`].
    pub rgb_to_lms_matrix: [i16; 9],
    pub signal_eotf: u16,
    pub signal_eotf_param0: u16,
    pub signal_eotf_param1: u16,
    pub signal_eotf_param2: u32,
    pub signal_bit_depth: u8,
    pub signal_color_space: u8,
    pub signal_chroma_format: u8,
    pub signal_full_range_flag: u8,
    pub source_min_pq: u16,
    pub source_max_pq: u16,
    pub source_diagonal: u16,
}

impl ColorMetadata {
    /// Returns true if the level 0 color description, excluding the per-RPU identifiers, equals
    /// that of `other`.
    pub fn same_color_as(&self, other: &ColorMetadata) -> bool {
        self.ycc_to_rgb_matrix == other.ycc_to_rgb_matrix
            && self.ycc_to_rgb_offset == other.ycc_to_rgb_offset
            && self.rgb_to_lms_matrix == other.rgb_to_lms_matrix
            && self.signal_eotf == other.signal_eotf
            && self.signal_eotf_param0 == other.signal_eotf_param0
            && self.signal_eotf_param1 == other.signal_eotf_param1
            && self.signal_eotf_param2 == other.signal_eotf_param2
            && self.signal_bit_depth == other.signal_bit_depth
            && self.signal_color_space == other.signal_color_space
            && self.signal_chroma_format == other.signal_chroma_format
            && self.signal_full_range_flag == other.signal_full_range_flag
            && self.source_min_pq == other.source_min_pq
            && self.source_max_pq == other.source_max_pq
            && self.source_diagonal == other.source_diagonal
    }
}

/// CIE 1931 xy chromaticities of a display, each in units of 2^-15.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayPrimaries {
    pub red_x: i16,
    pub red_y: i16,
    pub green_x: i16,
    pub green_y: i16,
    pub blue_x: i16,
    pub blue_y: i16,
    pub white_x: i16,
    pub white_y: i16,
}

impl DisplayPrimaries {
    pub fn is_zero(&self) -> bool {
        *self == DisplayPrimaries::default()
    }
}

/// Level 1: per-shot luminance statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel1 {
    pub min_pq: u16,
    pub max_pq: u16,
    pub avg_pq: u16,
}

/// Level 2: trims for a target display (CM v2.9).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel2 {
    pub target_max_pq: u16,
    pub trim_slope: u16,
    pub trim_offset: u16,
    pub trim_power: u16,
    pub trim_chroma_weight: u16,
    pub trim_saturation_gain: u16,
    pub ms_weight: i16,
}

/// Level 3: offsets to the level 1 statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel3 {
    pub min_pq_offset: u16,
    pub max_pq_offset: u16,
    pub avg_pq_offset: u16,
}

/// Level 4: temporal filtering anchors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel4 {
    pub anchor_pq: u16,
    pub anchor_power: u16,
}

/// Level 5: active area offsets (letterboxing).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel5 {
    pub left_offset: u16,
    pub right_offset: u16,
    pub top_offset: u16,
    pub bottom_offset: u16,
}

/// Level 6: static mastering display and content light level information.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel6 {
    pub max_luminance: u16,
    pub min_luminance: u16,
    pub max_cll: u16,
    pub max_fall: u16,
}

/// Level 8: trims for a target display (CM v4.0).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel8 {
    pub target_display_index: u8,
    pub trim_slope: u16,
    pub trim_offset: u16,
    pub trim_power: u16,
    pub trim_chroma_weight: u16,
    pub trim_saturation_gain: u16,
    pub ms_weight: u16,
    pub target_mid_contrast: u16,
    pub clip_trim: u16,
    pub saturation_vector_field: [u8; 6],
    pub hue_vector_field: [u8; 6],
}

/// Level 9: source display primaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel9 {
    pub source_primary_index: u8,
    pub source_display_primaries: DisplayPrimaries,
}

/// Level 10: custom target display.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel10 {
    pub target_display_index: u8,
    pub target_max_pq: u16,
    pub target_min_pq: u16,
    pub target_primary_index: u8,
    pub target_display_primaries: DisplayPrimaries,
}

/// Level 11: content type and intended picture mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel11 {
    pub content_type: u8,
    pub whitepoint: u8,
    pub reference_mode_flag: bool,
    pub sharpness: u8,
    pub noise_reduction: u8,
    pub mpeg_noise_reduction: u8,
    pub frame_rate_conversion: u8,
    pub brightness: u8,
    pub color: u8,
}

/// Level 254: CM v4.0 display management mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel254 {
    pub dm_mode: u8,
    pub dm_version_index: u8,
}

/// Level 255: CM v2.9 display management run mode and debug data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DmLevel255 {
    pub dm_run_mode: u8,
    pub dm_run_version: u8,
    pub dm_debug: [u8; 4],
}

/// A display management extension block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmData {
    Level1(DmLevel1),
    Level2(DmLevel2),
    Level3(DmLevel3),
    Level4(DmLevel4),
    Level5(DmLevel5),
    Level6(DmLevel6),
    Level8(DmLevel8),
    Level9(DmLevel9),
    Level10(DmLevel10),
    Level11(DmLevel11),
    Level254(DmLevel254),
    Level255(DmLevel255),
}

impl DmData {
    /// Gets the extension block level.
    pub fn level(&self) -> u8 {
        match self {
            DmData::Level1(_) => 1,
            DmData::Level2(_) => 2,
            DmData::Level3(_) => 3,
            DmData::Level4(_) => 4,
            DmData::Level5(_) => 5,
            DmData::Level6(_) => 6,
            DmData::Level8(_) => 8,
            DmData::Level9(_) => 9,
            DmData::Level10(_) => 10,
            DmData::Level11(_) => 11,
            DmData::Level254(_) => 254,
            DmData::Level255(_) => 255,
        }
    }

    /// Returns true if the block is carried in the CM v4.0 extension block group.
    pub fn is_cm_v4(&self) -> bool {
        matches!(
            self,
            DmData::Level3(_)
                | DmData::Level8(_)
                | DmData::Level9(_)
                | DmData::Level10(_)
                | DmData::Level11(_)
                | DmData::Level254(_)
        )
    }
}

/// A complete, self-contained, set of Dolby Vision metadata for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoviMetadata {
    pub header: RpuDataHeader,
    pub mapping: DataMapping,
    pub color: ColorMetadata,
    /// Extension blocks. Static blocks precede dynamic blocks.
    pub ext_blocks: Vec<DmData>,
}

impl DoviMetadata {
    /// Finds the first extension block of the given level.
    pub fn find_level(&self, level: u8) -> Option<&DmData> {
        self.ext_blocks.iter().find(|block| block.level() == level)
    }

    /// Gets the size, in bytes, of the record including its extension blocks.
    pub fn byte_size(&self) -> usize {
        std::mem::size_of::<DoviMetadata>()
            + self.ext_blocks.len() * std::mem::size_of::<DmData>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_find_level() {
        let metadata = DoviMetadata {
            ext_blocks: vec![
                DmData::Level6(DmLevel6 { max_luminance: 1000, ..Default::default() }),
                DmData::Level1(DmLevel1 { min_pq: 0, max_pq: 2081, avg_pq: 1229 }),
                DmData::Level2(DmLevel2 { target_max_pq: 2851, ..Default::default() }),
                DmData::Level2(DmLevel2 { target_max_pq: 3079, ..Default::default() }),
            ],
            ..Default::default()
        };

        match metadata.find_level(2) {
            Some(DmData::Level2(l2)) => assert_eq!(l2.target_max_pq, 2851),
            _ => panic!("expected a level 2 block"),
        }

        assert!(metadata.find_level(5).is_none());
        assert!(metadata.byte_size() > std::mem::size_of::<DoviMetadata>());
    }

    #[test]
    fn verify_compression_bits() {
        assert_eq!(DoviCompression::from_bits(0), DoviCompression::None);
        assert_eq!(DoviCompression::from_bits(1), DoviCompression::Limited);
        assert_eq!(DoviCompression::from_bits(2), DoviCompression::Reserved);
        assert_eq!(DoviCompression::from_bits(3), DoviCompression::Extended);
        assert!(DoviCompression::Limited < DoviCompression::Extended);
    }
}
