// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NAL unit helpers shared by the H.264 and HEVC bitstream tools.

/// HEVC NAL unit type of Dolby Vision RPUs (UNSPEC62).
pub const HEVC_NAL_UNSPEC62: u8 = 62;

/// HEVC NAL unit type of Dolby Vision enhancement layers (UNSPEC63).
pub const HEVC_NAL_UNSPEC63: u8 = 63;

/// Gets the NAL unit type of a 2-byte HEVC NAL unit header.
pub fn hevc_nal_unit_type(header: &[u8]) -> Option<u8> {
    header.first().map(|byte| (byte >> 1) & 0x3f)
}

/// Appends `rbsp` to `out`, inserting an emulation prevention byte (0x03) wherever two 0x00 bytes
/// would be followed by a byte less than or equal to 0x03.
pub fn escape_rbsp(rbsp: &[u8], out: &mut Vec<u8>) {
    out.reserve(rbsp.len() + rbsp.len() / 64);

    let mut zeros = 0;

    for &byte in rbsp {
        if zeros >= 2 && byte <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }

        out.push(byte);

        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
}

/// Removes emulation prevention bytes: every 0x03 that follows two 0x00 bytes.
pub fn unescape_rbsp(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());

    let mut zeros = 0;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }

        rbsp.push(byte);

        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }

    rbsp
}
