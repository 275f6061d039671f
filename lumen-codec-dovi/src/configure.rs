// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::{debug, error, warn};

use lumen_common::mpeg::video::DoviDecoderConfigurationRecord;
use lumen_core::codecs::video::well_known::extra_data::VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG;
use lumen_core::codecs::video::well_known::{CODEC_ID_AV1, CODEC_ID_H264, CODEC_ID_HEVC};
use lumen_core::codecs::video::{VideoCodecParameters, VideoEncodeContext, VideoExtraData};
use lumen_core::codecs::Compliance;
use lumen_core::errors::{invalid_argument_error, rejected_error, unsupported_error, Result};
use lumen_core::video::dovi::{DoviCompression, DoviMetadata};
use lumen_core::video::{ColorPrimaries, FrameSideData, MatrixCoefficients, PixelFormat};
use lumen_core::video::TransferCharacteristics;

use crate::context::DoviContext;
use crate::{guess_profile_hevc, DoviEnable};

/// The limits of a Dolby Vision level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DoviLevelLimits {
    /// The maximum number of luma samples per second.
    pub max_pps: u64,
    /// The maximum width, in pixels.
    pub max_width: u32,
}

const fn limits(width: u64, height: u64, fps: u64, max_width: u32) -> DoviLevelLimits {
    DoviLevelLimits { max_pps: width * height * fps, max_width }
}

/// The limits of Dolby Vision levels 1 through 13.
pub const DOVI_LEVELS: [DoviLevelLimits; 13] = [
    limits(1280, 720, 24, 1280),
    limits(1280, 720, 30, 1280),
    limits(1920, 1080, 24, 1920),
    limits(1920, 1080, 30, 2560),
    limits(1920, 1080, 60, 3840),
    limits(3840, 2160, 24, 3840),
    limits(3840, 2160, 30, 3840),
    limits(3840, 2160, 48, 3840),
    limits(3840, 2160, 60, 3840),
    limits(3840, 2160, 120, 3840),
    limits(3840, 2160, 120, 7680),
    limits(7680, 4320, 60, 7680),
    limits(7680, 4320, 120, 7680),
];

/// Gets the lowest Dolby Vision level permitting the given width and luma sample rate.
pub fn level_for(width: u32, pps: u64) -> Option<u8> {
    DOVI_LEVELS
        .iter()
        .position(|level| pps <= level.max_pps && width <= level.max_width)
        .map(|idx| idx as u8 + 1)
}

/// Gets the base layer signal compatibility ID implied by the color description.
fn compatibility_id(params: &VideoCodecParameters) -> Option<u8> {
    match (params.matrix, params.color_primaries, params.transfer) {
        (MatrixCoefficients::Bt2020Ncl, ColorPrimaries::Bt2020, TransferCharacteristics::Pq) => {
            Some(1)
        }
        (MatrixCoefficients::Bt2020Ncl, ColorPrimaries::Bt2020, TransferCharacteristics::Hlg) => {
            Some(4)
        }
        (MatrixCoefficients::Bt709, ColorPrimaries::Bt709, TransferCharacteristics::Bt709) => {
            Some(2)
        }
        _ => None,
    }
}

impl DoviContext {
    /// Selects the Dolby Vision configuration of an encoded stream and adds the configuration
    /// record to `params`.
    ///
    /// If Dolby Vision is disabled, or automatic and there is no metadata, or automatic and the
    /// stream cannot carry Dolby Vision, the configuration is cleared and `Ok` is returned.
    pub fn configure_ext(
        &mut self,
        params: &mut VideoCodecParameters,
        metadata: Option<&DoviMetadata>,
        compression: DoviCompression,
        compliance: Compliance,
    ) -> Result<()> {
        let hdr = metadata.map(|metadata| &metadata.header);

        if self.enable == DoviEnable::Off || (self.enable == DoviEnable::Auto && hdr.is_none()) {
            self.skip_configure(params);
            return Ok(());
        }

        if compression == DoviCompression::Reserved {
            return invalid_argument_error("dovi: reserved metadata compression");
        }

        let mut profile = match params.codec {
            CODEC_ID_AV1 => 10,
            CODEC_ID_H264 => 9,
            CODEC_ID_HEVC => match hdr {
                Some(hdr) => guess_profile_hevc(hdr),
                // Likely IPTPQc2.
                None if params.matrix == MatrixCoefficients::IptC2 => 5,
                None if params.matrix == MatrixCoefficients::Unspecified
                    && params.transfer == TransferCharacteristics::Unspecified =>
                {
                    5
                }
                None => 8,
            },
            _ => return invalid_argument_error("dovi: codec cannot carry dolby vision"),
        };

        if compliance > Compliance::Unofficial {
            let required = if profile == 9 { PixelFormat::Yuv420p } else { PixelFormat::Yuv420p10 };

            if params.pixel_format != Some(required) {
                profile = 0;
            }
        }

        let compatibility_id = match profile {
            4 | 7 => {
                if self.enable == DoviEnable::On {
                    error!("{}: coding of enhancement layers is unsupported", self.label());
                    return unsupported_error("dovi: enhancement layers");
                }

                self.skip_configure(params);
                return Ok(());
            }
            5 => Some(0),
            10 if hdr.is_some_and(|hdr| hdr.bl_video_full_range_flag) => Some(0),
            8 | 10 => compatibility_id(params),
            _ => None,
        };

        let compatibility_id = match compatibility_id {
            Some(id) if profile != 0 => id,
            _ => {
                if self.enable == DoviEnable::On {
                    error!(
                        "{}: dolby vision enabled, but the profile and compatibility mode are \
                         unknown, check the color description and pixel format",
                        self.label()
                    );
                    return invalid_argument_error("dovi: unknown profile or compatibility mode");
                }

                self.skip_configure(params);
                return Ok(());
            }
        };

        if compression != DoviCompression::None {
            if profile < 8 && compliance > Compliance::Unofficial {
                error!("{}: metadata compression requires profile 8 or later", self.label());
                return rejected_error("dovi: metadata compression requires profile 8 or later");
            }
            else if compression == DoviCompression::Extended && compliance > Compliance::Experimental
            {
                error!("{}: extended metadata compression is experimental", self.label());
                return rejected_error("dovi: extended metadata compression is experimental");
            }
            else if profile == 8 {
                warn!(
                    "{}: metadata compression for profile 8 is unsupported by many devices",
                    self.label()
                );
            }
        }

        let width = u32::from(params.width.unwrap_or(0));
        let height = u32::from(params.height.unwrap_or(0));

        let pixels = u64::from(width) * u64::from(height);

        // Unknown, or degenerate, frame rates are assumed to be 25 fps.
        let pps = match params.frame_rate {
            Some(frame_rate) if frame_rate.numer != 0 && frame_rate.denom != 0 => {
                frame_rate.scale(pixels)
            }
            _ => pixels * 25,
        };

        let level = match level_for(width, pps) {
            Some(level) => level,
            None if compliance >= Compliance::Strict => {
                error!("{}: pps ({}) and width ({}) exceed all levels", self.label(), pps, width);
                return invalid_argument_error("dovi: pps and width exceed all levels");
            }
            None => {
                warn!(
                    "{}: pps ({}) and width ({}) exceed all levels, the stream may be \
                     non-conforming",
                    self.label(),
                    pps,
                    width
                );
                DOVI_LEVELS.len() as u8
            }
        };

        self.cfg = DoviDecoderConfigurationRecord {
            dv_version_major: 1,
            dv_version_minor: 0,
            dv_profile: profile,
            dv_level: level,
            rpu_present_flag: true,
            el_present_flag: false,
            bl_present_flag: true,
            dv_bl_signal_compatibility_id: compatibility_id,
            dv_md_compression: compression,
        };

        debug!(
            "{}: configured profile {} level {} compatibility {}",
            self.label(),
            profile,
            level,
            compatibility_id
        );

        params.replace_extra_data(VideoExtraData {
            id: VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG,
            data: Box::new(self.cfg.write()),
        });

        Ok(())
    }

    /// Selects the Dolby Vision configuration of an encoder from its parameters and the metadata
    /// of the source frames.
    pub fn configure(&mut self, ctx: &mut VideoEncodeContext) -> Result<()> {
        let metadata = ctx.decoded_side_data.iter().find_map(|side_data| match side_data {
            FrameSideData::DoviMetadata(metadata) => Some(&**metadata),
            _ => None,
        });

        self.configure_ext(&mut ctx.params, metadata, DoviCompression::None, ctx.compliance)
    }

    fn skip_configure(&mut self, params: &mut VideoCodecParameters) {
        self.cfg = Default::default();
        params.extra_data.retain(|extra| extra.id != VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lumen_core::codecs::video::well_known::CODEC_ID_VP9;
    use lumen_core::errors::Error;
    use lumen_core::units::FrameRate;
    use lumen_core::video::dovi::RpuDataHeader;

    fn params(codec: lumen_core::codecs::video::VideoCodecId) -> VideoCodecParameters {
        let mut params = VideoCodecParameters::default();
        params
            .for_codec(codec)
            .with_width(3840)
            .with_height(2160)
            .with_frame_rate(FrameRate { numer: 24000, denom: 1001 })
            .with_pixel_format(PixelFormat::Yuv420p10)
            .with_color(
                ColorPrimaries::Bt2020,
                TransferCharacteristics::Pq,
                MatrixCoefficients::Bt2020Ncl,
            );
        params
    }

    fn metadata(hdr: RpuDataHeader) -> DoviMetadata {
        DoviMetadata { header: hdr, ..Default::default() }
    }

    fn profile8_header() -> RpuDataHeader {
        RpuDataHeader { rpu_type: 2, vdr_rpu_profile: 1, disable_residual_flag: true, ..Default::default() }
    }

    fn context(enable: DoviEnable) -> DoviContext {
        let mut ctx = DoviContext::new("test");
        ctx.enable = enable;
        ctx
    }

    #[test]
    fn verify_level_for() {
        assert_eq!(level_for(1920, 1920 * 1080 * 24), Some(3));
        assert_eq!(level_for(3840, 3840 * 2160 * 60), Some(9));
        assert_eq!(level_for(1280, 1280 * 720 * 24), Some(1));
        assert_eq!(level_for(2560, 1), Some(4));
        assert_eq!(level_for(7680, 7680 * 4320 * 120), Some(13));
        assert_eq!(level_for(7681, 1), None);
        assert_eq!(level_for(7680, 7680 * 4320 * 120 + 1), None);

        // Levels are ordered.
        for pair in DOVI_LEVELS.windows(2) {
            assert!(pair[0].max_pps <= pair[1].max_pps);
            assert!(pair[0].max_width <= pair[1].max_width);
        }
    }

    #[test]
    fn verify_configure_levels() {
        let mut ctx = context(DoviEnable::On);

        let mut hd = params(CODEC_ID_HEVC);
        hd.with_width(1920).with_height(1080).with_frame_rate(FrameRate { numer: 24, denom: 1 });
        ctx.configure_ext(&mut hd, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_level, 3);

        let mut uhd = params(CODEC_ID_HEVC);
        uhd.with_frame_rate(FrameRate { numer: 60, denom: 1 });
        ctx.configure_ext(&mut uhd, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_level, 9);

        // Without a frame rate, 25 fps is assumed.
        let mut unknown = params(CODEC_ID_HEVC);
        unknown.frame_rate = None;
        ctx.configure_ext(&mut unknown, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_level, 7);

        for frame_rate in [FrameRate { numer: 0, denom: 1 }, FrameRate { numer: 30, denom: 0 }] {
            let mut degenerate = params(CODEC_ID_HEVC);
            degenerate.with_frame_rate(frame_rate);
            ctx.configure_ext(&mut degenerate, None, DoviCompression::None, Compliance::Normal)
                .unwrap();
            assert_eq!(ctx.cfg.dv_level, 7);
        }

        // Beyond the last level.
        let mut huge = params(CODEC_ID_HEVC);
        huge.with_width(8192).with_height(4320);
        ctx.configure_ext(&mut huge, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_level, 13);

        assert!(matches!(
            ctx.configure_ext(&mut huge, None, DoviCompression::None, Compliance::Strict),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_configure_record() {
        let mut ctx = context(DoviEnable::On);
        let mut params = params(CODEC_ID_HEVC);

        ctx.configure_ext(&mut params, None, DoviCompression::None, Compliance::Normal).unwrap();

        let cfg = ctx.cfg;
        assert_eq!((cfg.dv_version_major, cfg.dv_version_minor), (1, 0));
        assert_eq!(cfg.dv_profile, 8);
        assert_eq!(cfg.dv_level, 6);
        assert_eq!(cfg.dv_bl_signal_compatibility_id, 1);
        assert!(cfg.rpu_present_flag && cfg.bl_present_flag && !cfg.el_present_flag);
        assert_eq!(cfg.dv_md_compression, DoviCompression::None);

        // Configuring again is deterministic and replaces the record.
        ctx.configure_ext(&mut params, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg, cfg);
        assert_eq!(params.extra_data.len(), 1);

        let extra = params.get_extra_data(VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG).unwrap();
        assert_eq!(&extra.data[..], &cfg.write()[..]);
        assert_eq!(DoviDecoderConfigurationRecord::read(&extra.data).unwrap(), cfg);
    }

    #[test]
    fn verify_configure_compatibility() {
        let mut ctx = context(DoviEnable::On);

        let mut hlg = params(CODEC_ID_HEVC);
        hlg.transfer = TransferCharacteristics::Hlg;
        ctx.configure_ext(&mut hlg, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_bl_signal_compatibility_id, 4);

        let mut sdr = params(CODEC_ID_HEVC);
        sdr.with_color(ColorPrimaries::Bt709, TransferCharacteristics::Bt709, MatrixCoefficients::Bt709);
        ctx.configure_ext(&mut sdr, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_bl_signal_compatibility_id, 2);

        // Unspecified color is likely IPTPQc2, profile 5.
        let mut ipt = params(CODEC_ID_HEVC);
        ipt.with_color(
            ColorPrimaries::Unspecified,
            TransferCharacteristics::Unspecified,
            MatrixCoefficients::Unspecified,
        );
        ctx.configure_ext(&mut ipt, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert_eq!((ctx.cfg.dv_profile, ctx.cfg.dv_bl_signal_compatibility_id), (5, 0));

        // AV1 with a full range base layer.
        let hdr = RpuDataHeader { bl_video_full_range_flag: true, ..profile8_header() };
        let mut av1 = params(CODEC_ID_AV1);
        av1.with_color(
            ColorPrimaries::Unspecified,
            TransferCharacteristics::Unspecified,
            MatrixCoefficients::Unspecified,
        );
        ctx.configure_ext(&mut av1, Some(&metadata(hdr)), DoviCompression::None, Compliance::Normal)
            .unwrap();
        assert_eq!((ctx.cfg.dv_profile, ctx.cfg.dv_bl_signal_compatibility_id), (10, 0));

        // No compatibility mode could be determined.
        let mut unknown = params(CODEC_ID_HEVC);
        unknown.color_primaries = ColorPrimaries::Unspecified;
        assert!(matches!(
            ctx.configure_ext(&mut unknown, None, DoviCompression::None, Compliance::Normal),
            Err(Error::InvalidArgument(_))
        ));

        // H.264 has no compatible base layer.
        let mut avc = params(CODEC_ID_H264);
        avc.with_pixel_format(PixelFormat::Yuv420p);
        assert!(ctx.configure_ext(&mut avc, None, DoviCompression::None, Compliance::Normal).is_err());

        let mut vp9 = params(CODEC_ID_VP9);
        assert!(matches!(
            ctx.configure_ext(&mut vp9, None, DoviCompression::None, Compliance::Normal),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_configure_skip() {
        let hdr = profile8_header();

        // Disabled.
        let mut ctx = context(DoviEnable::Off);
        ctx.cfg.dv_profile = 8;
        let mut params = params(CODEC_ID_HEVC);
        ctx.configure_ext(&mut params, Some(&metadata(hdr.clone())), DoviCompression::None, Compliance::Normal)
            .unwrap();
        assert!(!ctx.cfg.is_present());
        assert!(params.extra_data.is_empty());

        // Automatic without metadata. A previous record is removed.
        let mut ctx = context(DoviEnable::Auto);
        ctx.configure_ext(&mut params, Some(&metadata(hdr.clone())), DoviCompression::None, Compliance::Normal)
            .unwrap();
        assert_eq!(ctx.cfg.dv_profile, 8);
        assert_eq!(params.extra_data.len(), 1);

        ctx.configure_ext(&mut params, None, DoviCompression::None, Compliance::Normal).unwrap();
        assert!(!ctx.cfg.is_present());
        assert!(params.extra_data.is_empty());

        // Automatic with an unsuitable pixel format.
        let mut yuv8 = self::params(CODEC_ID_HEVC);
        yuv8.with_pixel_format(PixelFormat::Yuv420p);
        ctx.configure_ext(&mut yuv8, Some(&metadata(hdr.clone())), DoviCompression::None, Compliance::Normal)
            .unwrap();
        assert!(!ctx.cfg.is_present());

        // Unless unofficial extensions are permitted.
        ctx.configure_ext(&mut yuv8, Some(&metadata(hdr)), DoviCompression::None, Compliance::Unofficial)
            .unwrap();
        assert_eq!(ctx.cfg.dv_profile, 8);

        // Enabled with an unsuitable pixel format.
        let mut ctx = context(DoviEnable::On);
        assert!(matches!(
            ctx.configure_ext(&mut yuv8, None, DoviCompression::None, Compliance::Normal),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_configure_enhancement_layer() {
        let hdr = RpuDataHeader {
            vdr_rpu_profile: 1,
            el_spatial_resampling_filter_flag: true,
            vdr_bit_depth: 12,
            ..Default::default()
        };
        let metadata = metadata(hdr);

        let mut params = params(CODEC_ID_HEVC);

        let mut ctx = context(DoviEnable::On);
        assert!(matches!(
            ctx.configure_ext(&mut params, Some(&metadata), DoviCompression::None, Compliance::Normal),
            Err(Error::Unsupported(_))
        ));

        let mut ctx = context(DoviEnable::Auto);
        ctx.configure_ext(&mut params, Some(&metadata), DoviCompression::None, Compliance::Normal)
            .unwrap();
        assert!(!ctx.cfg.is_present());
    }

    #[test]
    fn verify_configure_compression() {
        let mut ctx = context(DoviEnable::On);
        let mut params = params(CODEC_ID_HEVC);

        ctx.configure_ext(&mut params, None, DoviCompression::Limited, Compliance::Normal).unwrap();
        assert_eq!(ctx.cfg.dv_md_compression, DoviCompression::Limited);

        assert!(matches!(
            ctx.configure_ext(&mut params, None, DoviCompression::Extended, Compliance::Normal),
            Err(Error::Rejected(_))
        ));
        ctx.configure_ext(&mut params, None, DoviCompression::Extended, Compliance::Experimental)
            .unwrap();
        assert_eq!(ctx.cfg.dv_md_compression, DoviCompression::Extended);

        assert!(matches!(
            ctx.configure_ext(&mut params, None, DoviCompression::Reserved, Compliance::Experimental),
            Err(Error::InvalidArgument(_))
        ));

        // Profile 5 does not permit compression.
        let mut ipt = self::params(CODEC_ID_HEVC);
        ipt.matrix = MatrixCoefficients::IptC2;
        assert!(matches!(
            ctx.configure_ext(&mut ipt, None, DoviCompression::Limited, Compliance::Normal),
            Err(Error::Rejected(_))
        ));
        ctx.configure_ext(&mut ipt, None, DoviCompression::Limited, Compliance::Unofficial).unwrap();
        assert_eq!(ctx.cfg.dv_profile, 5);
    }

    #[test]
    fn verify_configure_from_encode_context() {
        let mut enc = VideoEncodeContext {
            params: params(CODEC_ID_HEVC),
            decoded_side_data: Vec::new(),
            compliance: Compliance::Normal,
        };

        let mut ctx = context(DoviEnable::Auto);
        ctx.configure(&mut enc).unwrap();
        assert!(!ctx.cfg.is_present());

        enc.decoded_side_data.push(FrameSideData::DoviMetadata(Box::new(metadata(profile8_header()))));
        ctx.configure(&mut enc).unwrap();
        assert_eq!(ctx.cfg.dv_profile, 8);
        assert_eq!(ctx.cfg.dv_md_compression, DoviCompression::None);
        assert!(enc.params.get_extra_data(VIDEO_EXTRA_DATA_ID_DOLBY_VISION_CONFIG).is_some());
    }
}
