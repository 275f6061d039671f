// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dolby Vision reference processing unit (RPU) parser and generator.
//!
//! [`DoviContext`] carries the state shared between consecutive RPUs of a stream: the active
//! configuration record, the data mapping slots, the last level 0 color metadata, and the
//! extension blocks. RPUs are parsed into this state with [`DoviContext::parse`], exported as
//! self-contained [`DoviMetadata`] records, and synthesized back into (optionally compressed)
//! RPUs with [`DoviContext::generate`].

use bitflags::bitflags;

use lumen_core::video::dovi::{ColorMetadata, RpuDataHeader};

pub use lumen_core::video::dovi::DoviMetadata;

mod configure;
mod context;
mod ext;
mod generate;
mod parse;

pub mod container;

pub use configure::{level_for, DoviLevelLimits, DOVI_LEVELS};
pub use context::{DoviContext, DoviExt};

/// The largest data mapping and display management metadata ID.
pub const DOVI_MAX_DM_ID: usize = 15;
/// The maximum number of static extension blocks kept per RPU.
pub const DOVI_MAX_STATIC_EXT_BLOCKS: usize = 7;
/// The maximum number of dynamic extension blocks kept per RPU.
pub const DOVI_MAX_DYNAMIC_EXT_BLOCKS: usize = 25;

bitflags! {
    /// Options of [`DoviContext::generate`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct GenerateFlags: u32 {
        /// Wrap the RPU in a NAL unit payload, with emulation prevention.
        const WRAP_NAL     = 1 << 0;
        /// Wrap the RPU in an ITU-T T.35 message and EMDF container, for AV1.
        const WRAP_T35     = 1 << 1;
        /// Omit data that has not changed since the previous RPU, if the configuration permits.
        const COMPRESS_RPU = 1 << 2;
    }
}

/// Whether Dolby Vision metadata is written by an encoder.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DoviEnable {
    #[default]
    Off = 0,
    On = 1,
    /// Enabled if, and only if, the source frames carry Dolby Vision metadata.
    Auto = -1,
}

impl From<i32> for DoviEnable {
    fn from(value: i32) -> Self {
        match value {
            0 => DoviEnable::Off,
            v if v < 0 => DoviEnable::Auto,
            _ => DoviEnable::On,
        }
    }
}

impl From<DoviEnable> for i32 {
    fn from(value: DoviEnable) -> Self {
        value as i32
    }
}

/// The level 0 color metadata assumed when an RPU carries no display management data.
pub const COLOR_DEFAULT: ColorMetadata = ColorMetadata {
    dm_metadata_id: 0,
    scene_refresh_flag: 0,
    ycc_to_rgb_matrix: [9575, 0, 14742, 9575, 1754, 4383, 9575, 17372, 0],
    ycc_to_rgb_offset: [16777216, 134217728, 134217728],
    rgb_to_lms_matrix: [7222, 8771, 390, 2654, 12430, 1300, 0, 422, 15962],
    signal_eotf: 65535,
    signal_eotf_param0: 0,
    signal_eotf_param1: 0,
    signal_eotf_param2: 0,
    signal_bit_depth: 12,
    signal_color_space: 0,
    signal_chroma_format: 0,
    signal_full_range_flag: 1,
    source_min_pq: 62,
    source_max_pq: 3696,
    source_diagonal: 42,
};

/// Guesses the Dolby Vision profile of an HEVC stream from an RPU header. Returns 0 if the
/// profile cannot be determined.
pub fn guess_profile_hevc(hdr: &RpuDataHeader) -> u8 {
    match hdr.vdr_rpu_profile {
        0 if hdr.bl_video_full_range_flag => 5,
        1 => {
            if hdr.el_spatial_resampling_filter_flag && !hdr.disable_residual_flag {
                if hdr.vdr_bit_depth == 12 {
                    7
                }
                else {
                    4
                }
            }
            else {
                8
            }
        }
        _ => 0,
    }
}

/// Returns true if extension blocks of the given level describe the whole stream rather than the
/// current frame.
#[inline]
pub fn extension_is_static(level: u8) -> bool {
    matches!(level, 6 | 10 | 32 | 254 | 255)
}
