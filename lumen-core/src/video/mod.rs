// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `video` module provides primitives for describing decoded video frames and their color.

use smallvec::SmallVec;

pub mod dovi;

use dovi::DoviMetadata;

/// Color primaries as defined by ITU-T H.273 (`ColourPrimaries`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorPrimaries {
    Bt709,
    #[default]
    Unspecified,
    Bt470M,
    Bt470Bg,
    Smpte170M,
    Smpte240M,
    Film,
    Bt2020,
    Smpte428,
    Smpte431,
    Smpte432,
    Ebu3213,
}

impl ColorPrimaries {
    /// Maps a H.273 `ColourPrimaries` code point. Reserved values map to `Unspecified`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ColorPrimaries::Bt709,
            4 => ColorPrimaries::Bt470M,
            5 => ColorPrimaries::Bt470Bg,
            6 => ColorPrimaries::Smpte170M,
            7 => ColorPrimaries::Smpte240M,
            8 => ColorPrimaries::Film,
            9 => ColorPrimaries::Bt2020,
            10 => ColorPrimaries::Smpte428,
            11 => ColorPrimaries::Smpte431,
            12 => ColorPrimaries::Smpte432,
            22 => ColorPrimaries::Ebu3213,
            _ => ColorPrimaries::Unspecified,
        }
    }
}

/// Transfer characteristics as defined by ITU-T H.273 (`TransferCharacteristics`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransferCharacteristics {
    Bt709,
    #[default]
    Unspecified,
    Gamma22,
    Gamma28,
    Smpte170M,
    Smpte240M,
    Linear,
    Iec61966_2_4,
    Bt1361,
    Srgb,
    Bt2020_10,
    Bt2020_12,
    /// SMPTE ST 2084 perceptual quantizer.
    Pq,
    Smpte428,
    /// ARIB STD-B67 hybrid log-gamma.
    Hlg,
}

impl TransferCharacteristics {
    /// Maps a H.273 `TransferCharacteristics` code point. Reserved values map to `Unspecified`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => TransferCharacteristics::Bt709,
            4 => TransferCharacteristics::Gamma22,
            5 => TransferCharacteristics::Gamma28,
            6 => TransferCharacteristics::Smpte170M,
            7 => TransferCharacteristics::Smpte240M,
            8 => TransferCharacteristics::Linear,
            11 => TransferCharacteristics::Iec61966_2_4,
            12 => TransferCharacteristics::Bt1361,
            13 => TransferCharacteristics::Srgb,
            14 => TransferCharacteristics::Bt2020_10,
            15 => TransferCharacteristics::Bt2020_12,
            16 => TransferCharacteristics::Pq,
            17 => TransferCharacteristics::Smpte428,
            18 => TransferCharacteristics::Hlg,
            _ => TransferCharacteristics::Unspecified,
        }
    }
}

/// Matrix coefficients as defined by ITU-T H.273 (`MatrixCoefficients`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MatrixCoefficients {
    Rgb,
    Bt709,
    #[default]
    Unspecified,
    Fcc,
    Bt470Bg,
    Smpte170M,
    Smpte240M,
    YCgCo,
    /// BT.2020 non-constant luminance.
    Bt2020Ncl,
    /// BT.2020 constant luminance.
    Bt2020Cl,
    Smpte2085,
    ChromaDerivedNcl,
    ChromaDerivedCl,
    ICtCp,
    /// IPT-C2, as used by Dolby Vision profile 5.
    IptC2,
}

impl MatrixCoefficients {
    /// Maps a H.273 `MatrixCoefficients` code point. Reserved values map to `Unspecified`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => MatrixCoefficients::Rgb,
            1 => MatrixCoefficients::Bt709,
            4 => MatrixCoefficients::Fcc,
            5 => MatrixCoefficients::Bt470Bg,
            6 => MatrixCoefficients::Smpte170M,
            7 => MatrixCoefficients::Smpte240M,
            8 => MatrixCoefficients::YCgCo,
            9 => MatrixCoefficients::Bt2020Ncl,
            10 => MatrixCoefficients::Bt2020Cl,
            11 => MatrixCoefficients::Smpte2085,
            12 => MatrixCoefficients::ChromaDerivedNcl,
            13 => MatrixCoefficients::ChromaDerivedCl,
            14 => MatrixCoefficients::ICtCp,
            15 => MatrixCoefficients::IptC2,
            _ => MatrixCoefficients::Unspecified,
        }
    }
}

/// The memory layout of decoded pictures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 8 bits per sample.
    Yuv420p,
    /// Planar YUV 4:2:2, 8 bits per sample.
    Yuv422p,
    /// Planar YUV 4:4:4, 8 bits per sample.
    Yuv444p,
    /// Planar YUV 4:2:0, 10 bits per sample stored in 16 bits.
    Yuv420p10,
    /// Planar YUV 4:2:2, 10 bits per sample stored in 16 bits.
    Yuv422p10,
    /// Planar YUV 4:2:0, 12 bits per sample stored in 16 bits.
    Yuv420p12,
    /// Semi-planar YUV 4:2:0, 10 bits per sample stored in the upper bits of 16.
    P010,
}

impl PixelFormat {
    /// Gets the number of significant bits per sample.
    pub fn bits_per_sample(&self) -> u32 {
        match self {
            PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => 8,
            PixelFormat::Yuv420p10 | PixelFormat::Yuv422p10 | PixelFormat::P010 => 10,
            PixelFormat::Yuv420p12 => 12,
        }
    }
}

/// The type of a [`FrameSideData`] entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SideDataType {
    DoviMetadata,
    DoviRpuBuffer,
}

/// Auxiliary, typed, data attached to a decoded video frame.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum FrameSideData {
    /// Parsed Dolby Vision metadata.
    DoviMetadata(Box<DoviMetadata>),
    /// An unparsed Dolby Vision RPU, as found in the bitstream.
    DoviRpuBuffer(Box<[u8]>),
}

impl FrameSideData {
    /// Gets the type of the side data.
    pub fn data_type(&self) -> SideDataType {
        match self {
            FrameSideData::DoviMetadata(_) => SideDataType::DoviMetadata,
            FrameSideData::DoviRpuBuffer(_) => SideDataType::DoviRpuBuffer,
        }
    }
}

/// A decoded video frame as seen by metadata processors: its geometry and attached side data.
#[derive(Clone, Debug, Default)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: Option<PixelFormat>,
    side_data: SmallVec<[FrameSideData; 2]>,
}

impl VideoFrame {
    /// Instantiate a new `VideoFrame` with no side data.
    pub fn new(width: u32, height: u32, format: Option<PixelFormat>) -> Self {
        VideoFrame { width, height, format, side_data: SmallVec::new() }
    }

    /// Gets all attached side data.
    pub fn side_data(&self) -> &[FrameSideData] {
        &self.side_data
    }

    /// Gets the first side data entry of the given type.
    pub fn get_side_data(&self, data_type: SideDataType) -> Option<&FrameSideData> {
        self.side_data.iter().find(|sd| sd.data_type() == data_type)
    }

    /// Attaches side data, keeping existing entries of the same type.
    pub fn add_side_data(&mut self, side_data: FrameSideData) {
        self.side_data.push(side_data);
    }

    /// Attaches side data, replacing all existing entries of the same type.
    pub fn replace_side_data(&mut self, side_data: FrameSideData) {
        let data_type = side_data.data_type();
        self.side_data.retain(|sd| sd.data_type() != data_type);
        self.side_data.push(side_data);
    }

    /// Removes all side data of the given type.
    pub fn remove_side_data(&mut self, data_type: SideDataType) {
        self.side_data.retain(|sd| sd.data_type() != data_type);
    }
}
