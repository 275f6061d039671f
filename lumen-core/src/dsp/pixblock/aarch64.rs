// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AArch64 Advanced SIMD (NEON) pixel block primitives.
//!
//! The kernels operate on whole 8-lane rows, two rows per iteration, mirroring the register
//! allocation of a NEON implementation so the compiler can map each row onto a single vector.

use super::PixblockDsp;
use crate::cpu::CpuFlags;

impl PixblockDsp {
    /// Installs the NEON primitives permitted by `flags`.
    ///
    /// The 8-bit `get_pixels` kernel is only installed for 8-bit content.
    pub fn init_aarch64(&mut self, flags: CpuFlags, high_bit_depth: bool) {
        if flags.contains(CpuFlags::NEON) {
            if !high_bit_depth {
                self.get_pixels = get_pixels_neon;
                self.get_pixels_unaligned = get_pixels_neon;
            }
            self.diff_pixels = diff_pixels_neon;
            self.diff_pixels_unaligned = diff_pixels_neon;
        }
    }
}

#[inline(always)]
fn load_u8x8(src: &[u8], offset: usize) -> [u8; 8] {
    let mut lanes = [0u8; 8];
    lanes.copy_from_slice(&src[offset..offset + 8]);
    lanes
}

/// 8x8 load of 8-bit pixels, widening two rows per iteration.
pub fn get_pixels_neon(block: &mut [i16; 64], pixels: &[u8], stride: usize) {
    for (pair, out) in block.chunks_exact_mut(16).enumerate() {
        let row = 2 * pair;

        // uxtl
        let lo = load_u8x8(pixels, row * stride).map(i16::from);
        let hi = load_u8x8(pixels, (row + 1) * stride).map(i16::from);

        out[..8].copy_from_slice(&lo);
        out[8..].copy_from_slice(&hi);
    }
}

/// 8x8 difference of 8-bit pixels, two rows per iteration.
pub fn diff_pixels_neon(block: &mut [i16; 64], s1: &[u8], s2: &[u8], stride: usize) {
    for (pair, out) in block.chunks_exact_mut(16).enumerate() {
        let row = 2 * pair;

        for (half, dst) in out.chunks_exact_mut(8).enumerate() {
            let offset = (row + half) * stride;

            let a = load_u8x8(s1, offset);
            let b = load_u8x8(s2, offset);

            // usubl
            let mut diff = [0i16; 8];
            for lane in 0..8 {
                diff[lane] = i16::from(a[lane]) - i16::from(b[lane]);
            }

            dst.copy_from_slice(&diff);
        }
    }
}
