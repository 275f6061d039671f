// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Video codec specific support.

use std::fmt;

use crate::codecs::Compliance;
use crate::units::FrameRate;
use crate::video::{
    ColorPrimaries, FrameSideData, MatrixCoefficients, PixelFormat, TransferCharacteristics,
};

/// An `VideoCodecId` is a unique identifier used to identify a specific video codec.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoCodecId(u32);

/// Null video codec ID
pub const CODEC_ID_NULL_VIDEO: VideoCodecId = VideoCodecId(0x0);

impl Default for VideoCodecId {
    fn default() -> Self {
        CODEC_ID_NULL_VIDEO
    }
}

impl VideoCodecId {
    /// Create a new, application specific, video codec ID.
    pub const fn new(id: u32) -> VideoCodecId {
        // Well-known IDs never set the upper bit.
        Self(0x8000_0000 | id)
    }
}

impl fmt::Display for VideoCodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An `VideoExtraDataId` is a unique identifier used to identify a specific video extra data.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoExtraDataId(u32);

/// Null video extra data ID.
pub const VIDEO_EXTRA_DATA_ID_NULL: VideoExtraDataId = VideoExtraDataId(0x0);

impl Default for VideoExtraDataId {
    fn default() -> Self {
        VIDEO_EXTRA_DATA_ID_NULL
    }
}

/// Extra data for a video codec.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoExtraData {
    /// The extra data ID.
    pub id: VideoExtraDataId,
    /// Extra data (defined by codec)
    pub data: Box<[u8]>,
}

/// Codec parameters for video codecs.
#[derive(Clone, Debug, Default)]
pub struct VideoCodecParameters {
    /// The codec ID.
    pub codec: VideoCodecId,
    /// Video width.
    pub width: Option<u16>,
    /// Video height.
    pub height: Option<u16>,
    /// The frame rate, if constant and known.
    pub frame_rate: Option<FrameRate>,
    /// The pixel format of the coded pictures.
    pub pixel_format: Option<PixelFormat>,
    /// Chromaticity coordinates of the source primaries.
    pub color_primaries: ColorPrimaries,
    /// Opto-electronic transfer characteristics.
    pub transfer: TransferCharacteristics,
    /// Matrix coefficients used to derive luma and chroma from RGB primaries.
    pub matrix: MatrixCoefficients,
    /// Extra data (defined by the codec).
    pub extra_data: Vec<VideoExtraData>,
}

impl VideoCodecParameters {
    /// Provide the `VideoCodecId`.
    pub fn for_codec(&mut self, codec: VideoCodecId) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Provide video width.
    pub fn with_width(&mut self, width: u16) -> &mut Self {
        self.width = Some(width);
        self
    }

    /// Provide video height.
    pub fn with_height(&mut self, height: u16) -> &mut Self {
        self.height = Some(height);
        self
    }

    /// Provide the frame rate.
    pub fn with_frame_rate(&mut self, frame_rate: FrameRate) -> &mut Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Provide the pixel format.
    pub fn with_pixel_format(&mut self, pixel_format: PixelFormat) -> &mut Self {
        self.pixel_format = Some(pixel_format);
        self
    }

    /// Provide the color description: primaries, transfer characteristics, and matrix.
    pub fn with_color(
        &mut self,
        primaries: ColorPrimaries,
        transfer: TransferCharacteristics,
        matrix: MatrixCoefficients,
    ) -> &mut Self {
        self.color_primaries = primaries;
        self.transfer = transfer;
        self.matrix = matrix;
        self
    }

    /// Adds codec's extra data.
    pub fn add_extra_data(&mut self, data: VideoExtraData) -> &mut Self {
        self.extra_data.push(data);
        self
    }

    /// Adds codec's extra data, replacing all existing extra data with the same ID.
    pub fn replace_extra_data(&mut self, data: VideoExtraData) -> &mut Self {
        self.extra_data.retain(|extra| extra.id != data.id);
        self.extra_data.push(data);
        self
    }

    /// Gets the first extra data with the given ID.
    pub fn get_extra_data(&self, id: VideoExtraDataId) -> Option<&VideoExtraData> {
        self.extra_data.iter().find(|extra| extra.id == id)
    }
}

/// `VideoEncodeContext` is the state an encoder exposes to auxiliary metadata writers while it is
/// being configured.
#[derive(Clone, Debug, Default)]
pub struct VideoEncodeContext {
    /// The coded stream parameters. Writers may add extra data.
    pub params: VideoCodecParameters,
    /// Side data carried over from the decoded source frames, if any.
    pub decoded_side_data: Vec<FrameSideData>,
    /// The requested standards compliance.
    pub compliance: Compliance,
}

/// Codec IDs for well-known video codecs.
pub mod well_known {
    use super::VideoCodecId;

    /// On2 TrueMotion VP9 (VP9)
    pub const CODEC_ID_VP9: VideoCodecId = VideoCodecId(0x806);
    /// AOMedia Video 1 (AV1)
    pub const CODEC_ID_AV1: VideoCodecId = VideoCodecId(0x901);
    /// Advanced Video Codec (AVC, MPEG-4 AVC, MPEG-4 Part 10, H.264)
    pub const CODEC_ID_H264: VideoCodecId = VideoCodecId(0xb04);
    /// High Efficiency Video Coding (HEVC, H.265, MPEG-H Part 2)
    pub const CODEC_ID_HEVC: VideoCodecId = VideoCodecId(0xb05);
    /// Versatile Video Coding (VVC, H.266, MPEG-I Part 3)
    pub const CODEC_ID_VVC: VideoCodecId = VideoCodecId(0xb06);

    pub mod extra_data {
        use crate::codecs::video::VideoExtraDataId;

        /// AVCDecoderConfigurationRecord
        pub const VIDEO_EXTRA_DATA_ID_AVC_DECODER_CONFIG: VideoExtraDataId = VideoExtraDataId(1);

        /// HEVCDecoderConfigurationRecord
        pub const VIDEO_EXTRA_DATA_ID_HEVC_DECODER_CONFIG: VideoExtraDataId = VideoExtraDataId(2);

        /// AV1DecoderConfiguration
        pub const VIDEO_EXTRA_DATA_ID_AV1_DECODER_CONFIG: VideoExtraDataId = VideoExtraDataId(4);

        /// DolbyVisionConfiguration
        pub const VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG: VideoExtraDataId = VideoExtraDataId(5);
    }
}
