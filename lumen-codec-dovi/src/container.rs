// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RPU encapsulation.
//!
//! HEVC and H.264 carry RPUs in NAL units: a `0x19` prefix byte followed by the RPU with
//! emulation prevention. AV1 carries them in ITU-T T.35 metadata OBUs, wrapped in a fixed EMDF
//! container whose payload is not byte aligned.

use log::error;

use lumen_common::mpeg::video::nal::{escape_rbsp, hevc_nal_unit_type, unescape_rbsp};
use lumen_common::mpeg::video::nal::HEVC_NAL_UNSPEC62;
use lumen_core::checksum::Crc32;
use lumen_core::codecs::ErrorRecognition;
use lumen_core::errors::{decode_error, limit_error, Result};
use lumen_core::io::{BitReaderLtr, BitWriterLtr, FiniteBitStream, Monitor, ReadBitsLtr};

/// The first byte of an RPU in a NAL unit.
pub const RPU_NAL_PREFIX: u8 = 0x19;

/// The last byte of every RPU.
pub const RPU_TERMINATOR: u8 = 0x80;

pub const T35_COUNTRY_CODE_US: u8 = 0xb5;
pub const T35_PROVIDER_CODE_DOLBY: u16 = 0x003b;
pub const T35_PROVIDER_ORIENTED_CODE: u32 = 0x0000_0800;

/// The size of the T.35 header preceding the EMDF container.
const T35_HEADER_LEN: usize = 7;

/// The fixed EMDF header fields: version 0, key ID 6, payload ID 31, payload ID extension 225,
/// and the discard unknown payload flag.
const EMDF_HEADER: u32 = 0x01be_6841;

/// The fixed EMDF trailer: the payload ID terminator and protection bits.
const EMDF_PROTECTION: u32 = 0x400;

/// The range of EMDF payload sizes accepted by the parser.
const EMDF_MIN_PAYLOAD: u32 = 6;
const EMDF_MAX_PAYLOAD: u32 = 512;

/// Reads an EMDF `variable_bits(n)` field.
fn read_variable_bits(bs: &mut BitReaderLtr<'_>, n: u32) -> Result<u32> {
    let mut value = bs.read_bits_leq32(n)?;

    while bs.read_bit()? {
        value = value.saturating_add(1).saturating_mul(1 << n).saturating_add(bs.read_bits_leq32(n)?);
    }

    Ok(value)
}

/// Extracts the RPU from an EMDF container into `buf`.
pub(crate) fn read_emdf(data: &[u8], buf: &mut Vec<u8>) -> Result<()> {
    let mut bs = BitReaderLtr::new(data);

    if bs.read_bits_leq32(27)? != EMDF_HEADER {
        return decode_error("dovi: invalid emdf header");
    }

    let size = read_variable_bits(&mut bs, 8)?;

    if size < EMDF_MIN_PAYLOAD || size > EMDF_MAX_PAYLOAD {
        return decode_error("dovi: invalid emdf payload size");
    }

    if 8 * u64::from(size) > bs.bits_left() {
        return decode_error("dovi: emdf payload exceeds the buffer");
    }

    // The payload is misaligned by one bit. Copy it out so the RPU is byte aligned.
    buf.clear();
    buf.reserve(size as usize);

    for _ in 0..size {
        buf.push(bs.read_bits_leq32(8)? as u8);
    }

    if bs.read_bits_leq32(17)? != EMDF_PROTECTION {
        return decode_error("dovi: invalid emdf protection");
    }

    Ok(())
}

/// Strips the RPU NAL prefix and any trailing zero padding.
pub(crate) fn strip_nal_prefix(data: &[u8]) -> Result<&[u8]> {
    let rpu = match data.split_first() {
        Some((&RPU_NAL_PREFIX, rpu)) => rpu,
        _ => return decode_error("dovi: missing rpu nal prefix"),
    };

    let len = rpu.iter().rposition(|&byte| byte != 0).map_or(0, |pos| pos + 1);

    Ok(&rpu[..len])
}

/// Checks the terminator, and if requested, the CRC of an RPU.
pub(crate) fn verify_rpu(rpu: &[u8], err_recognition: ErrorRecognition, label: &str) -> Result<()> {
    if rpu.len() < 5 || rpu[rpu.len() - 1] != RPU_TERMINATOR {
        return decode_error("dovi: missing rpu terminator");
    }

    if err_recognition.contains(ErrorRecognition::CRCCHECK) {
        let (body, tail) = rpu.split_at(rpu.len() - 5);
        let expected = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);

        let mut crc32 = Crc32::mpeg2();
        crc32.process_buf_bytes(body);

        if crc32.crc() != expected {
            error!("{}: rpu crc mismatch: {:08x} != {:08x}", label, crc32.crc(), expected);

            if err_recognition.contains(ErrorRecognition::EXPLODE) {
                return decode_error("dovi: rpu crc mismatch");
            }
        }
    }

    Ok(())
}

/// Appends the CRC and terminator to a byte aligned RPU.
pub(crate) fn finish_rpu(rpu: &mut Vec<u8>) {
    let mut crc32 = Crc32::mpeg2();
    crc32.process_buf_bytes(rpu);

    rpu.extend_from_slice(&crc32.crc().to_be_bytes());
    rpu.push(RPU_TERMINATOR);
}

/// Wraps an RPU in a NAL unit payload.
pub fn wrap_nal(rpu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + rpu.len() + rpu.len() / 2);
    out.push(RPU_NAL_PREFIX);
    escape_rbsp(rpu, &mut out);
    out
}

/// Wraps an RPU in a T.35 message with an EMDF container.
pub fn wrap_t35(rpu: &[u8]) -> Result<Vec<u8>> {
    let size = rpu.len();

    if size > 0x1_0000 {
        return limit_error("dovi: rpu is too large for an emdf container");
    }

    let mut bw = BitWriterLtr::with_capacity(size + 15);

    bw.write_bits_leq32(u32::from(T35_COUNTRY_CODE_US), 8);
    bw.write_bits_leq32(u32::from(T35_PROVIDER_CODE_DOLBY), 16);
    bw.write_bits_leq32(T35_PROVIDER_ORIENTED_CODE, 32);
    bw.write_bits_leq32(EMDF_HEADER, 27);

    if size > 0xff {
        bw.write_bits_leq32((size >> 8) as u32 - 1, 8);
        bw.write_bit(true);
        bw.write_bits_leq32(size as u32 & 0xff, 8);
        bw.write_bit(false);
    }
    else {
        bw.write_bits_leq32(size as u32, 8);
        bw.write_bit(false);
    }

    bw.write_bytes(rpu);
    bw.write_bits_leq32(EMDF_PROTECTION, 17);

    // Pad to the next byte with 1 bits.
    let pad = ((8 - bw.bits_written() % 8) % 8) as u32;
    bw.write_bits_leq32((1 << pad) - 1, pad);

    Ok(bw.into_bytes())
}

/// Gets the EMDF container of a T.35 message carrying a Dolby Vision RPU.
pub fn unwrap_t35(data: &[u8]) -> Result<&[u8]> {
    if data.len() < T35_HEADER_LEN {
        return decode_error("dovi: t.35 message is too short");
    }

    let provider_code = u16::from_be_bytes([data[1], data[2]]);
    let provider_oriented_code = u32::from_be_bytes([data[3], data[4], data[5], data[6]]);

    if data[0] != T35_COUNTRY_CODE_US
        || provider_code != T35_PROVIDER_CODE_DOLBY
        || provider_oriented_code != T35_PROVIDER_ORIENTED_CODE
    {
        return decode_error("dovi: t.35 message is not a dolby vision rpu");
    }

    Ok(&data[T35_HEADER_LEN..])
}

/// Gets the RPU NAL payload, starting at the `0x19` prefix, of a NAL unit. An Annex B start code
/// and an HEVC UNSPEC62 NAL unit header are skipped if present. Emulation prevention is removed.
pub fn unwrap_nal(data: &[u8]) -> Vec<u8> {
    let mut nal = data;

    for start_code in [&[0u8, 0, 0, 1][..], &[0, 0, 1]] {
        if let Some(rest) = nal.strip_prefix(start_code) {
            nal = rest;
            break;
        }
    }

    if nal.len() > 2 && nal[0] != RPU_NAL_PREFIX && hevc_nal_unit_type(nal) == Some(HEVC_NAL_UNSPEC62)
    {
        nal = &nal[2..];
    }

    unescape_rbsp(nal)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal RPU body followed by its CRC and terminator.
    fn rpu(body: &[u8]) -> Vec<u8> {
        let mut rpu = body.to_vec();
        finish_rpu(&mut rpu);
        rpu
    }

    #[test]
    fn verify_crc_check() {
        let good = rpu(&[0x08, 0x09, 0x00, 0x00, 0x00]);
        let er = ErrorRecognition::CRCCHECK | ErrorRecognition::EXPLODE;

        assert!(verify_rpu(&good, er, "test").is_ok());

        let mut bad = good.clone();
        bad[1] ^= 0x10;

        // A mismatch is only fatal when exploding on errors.
        assert!(verify_rpu(&bad, ErrorRecognition::CRCCHECK, "test").is_ok());
        assert!(verify_rpu(&bad, er, "test").is_err());
        assert!(verify_rpu(&bad, ErrorRecognition::empty(), "test").is_ok());
    }

    #[test]
    fn verify_terminator() {
        assert!(verify_rpu(&[0x80], ErrorRecognition::empty(), "test").is_err());
        assert!(verify_rpu(&[1, 2, 3, 4, 5, 6], ErrorRecognition::empty(), "test").is_err());
        assert!(verify_rpu(&[1, 2, 3, 4, 0x80], ErrorRecognition::empty(), "test").is_ok());
    }

    #[test]
    fn verify_strip_nal_prefix() {
        assert_eq!(strip_nal_prefix(&[0x19, 0x08, 0x80, 0x00, 0x00]).unwrap(), &[0x08, 0x80]);
        assert_eq!(strip_nal_prefix(&[0x19]).unwrap(), &[] as &[u8]);
        assert!(strip_nal_prefix(&[0x18, 0x08, 0x80]).is_err());
        assert!(strip_nal_prefix(&[]).is_err());
    }

    #[test]
    fn verify_nal_wrap() {
        let rpu = rpu(&[0x08, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let nal = wrap_nal(&rpu);

        assert_eq!(nal[0], RPU_NAL_PREFIX);
        assert_eq!(&nal[1..6], &[0x08, 0x00, 0x00, 0x03, 0x01]);
        assert_eq!(unwrap_nal(&nal), [&[RPU_NAL_PREFIX][..], &rpu].concat());

        // With start code and HEVC NAL unit header.
        let mut unit = vec![0x00, 0x00, 0x00, 0x01, 0x7c, 0x01];
        unit.extend_from_slice(&nal);
        assert_eq!(unwrap_nal(&unit), unwrap_nal(&nal));
    }

    #[test]
    fn verify_t35_wrap() {
        for size in [6usize, 200, 255, 256, 511] {
            let payload: Vec<u8> = (0..size).map(|i| (i * 7) as u8).collect();

            let t35 = wrap_t35(&payload).unwrap();
            assert_eq!(&t35[..7], &[0xb5, 0x00, 0x3b, 0x00, 0x00, 0x08, 0x00]);

            let mut buf = Vec::new();
            read_emdf(unwrap_t35(&t35).unwrap(), &mut buf).unwrap();
            assert_eq!(buf, payload);
        }
    }

    #[test]
    fn verify_emdf_limits() {
        let mut buf = Vec::new();

        let t35 = wrap_t35(&[0u8; 5]).unwrap();
        assert!(read_emdf(unwrap_t35(&t35).unwrap(), &mut buf).is_err());

        let t35 = wrap_t35(&[0u8; 513]).unwrap();
        assert!(read_emdf(unwrap_t35(&t35).unwrap(), &mut buf).is_err());

        let t35 = wrap_t35(&[0u8; 64]).unwrap();
        let emdf = unwrap_t35(&t35).unwrap();
        assert!(read_emdf(&emdf[..40], &mut buf).is_err());

        let mut bad = emdf.to_vec();
        bad[0] ^= 0x01;
        assert!(read_emdf(&bad, &mut buf).is_err());

        assert!(unwrap_t35(&[0xb5, 0x00, 0x3c, 0x00, 0x00, 0x08, 0x00, 0x00]).is_err());
    }
}
