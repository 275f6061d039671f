// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RISC-V vector (RVV) inverse transform output primitives.
//!
//! The whole 8x8 block is processed as one 64-element strip, which requires 128-bit or wider
//! vector registers at LMUL 8.

use super::IdctDsp;
use crate::cpu::CpuFlags;

impl IdctDsp {
    /// Installs the RVV primitives permitted by `flags`. Requires 64-bit element support and a
    /// vector length of at least 128 bits.
    pub fn init_riscv(&mut self, flags: CpuFlags) {
        if flags.contains(CpuFlags::RVV_I64 | CpuFlags::RV_ZVL128B) {
            self.put_pixels_clamped = put_pixels_clamped_rvv;
            self.put_signed_pixels_clamped = put_signed_pixels_clamped_rvv;
            self.add_pixels_clamped = add_pixels_clamped_rvv;
        }
    }
}

/// Narrows a strip of 64 coefficients to 8-bit with unsigned saturation (vmax + vnclipu).
#[inline(always)]
fn narrow_clip(strip: &[i32; 64]) -> [u8; 64] {
    strip.map(|v| v.clamp(0, 255) as u8)
}

#[inline(always)]
fn store_rows(strip: &[u8; 64], pixels: &mut [u8], stride: usize) {
    for (row, src) in strip.chunks_exact(8).enumerate() {
        pixels[row * stride..row * stride + 8].copy_from_slice(src);
    }
}

pub fn put_pixels_clamped_rvv(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    let strip = block.map(i32::from);
    store_rows(&narrow_clip(&strip), pixels, stride);
}

pub fn put_signed_pixels_clamped_rvv(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    let strip = block.map(|c| i32::from(c) + 128);
    store_rows(&narrow_clip(&strip), pixels, stride);
}

pub fn add_pixels_clamped_rvv(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    // Strided segment load of the destination rows.
    let mut strip = [0i32; 64];
    for (row, dst) in strip.chunks_exact_mut(8).enumerate() {
        for (d, &p) in dst.iter_mut().zip(&pixels[row * stride..row * stride + 8]) {
            *d = i32::from(p);
        }
    }

    for (d, &c) in strip.iter_mut().zip(block.iter()) {
        *d += i32::from(c);
    }

    store_rows(&narrow_clip(&strip), pixels, stride);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::idct::{add_pixels_clamped, put_pixels_clamped, put_signed_pixels_clamped};

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn verify_rvv_gating() {
        let base = IdctDsp::with_flags(CpuFlags::empty());

        // 64-bit elements without a known vector length is not enough.
        for flags in [
            CpuFlags::RVV_I64,
            CpuFlags::RV_ZVL128B,
            CpuFlags::RVV_I32 | CpuFlags::RV_ZVL128B,
            CpuFlags::NEON,
        ] {
            let mut dsp = base;
            dsp.init_riscv(flags);
            assert_eq!(dsp.put_pixels_clamped as usize, put_pixels_clamped as usize);
            assert_eq!(dsp.add_pixels_clamped as usize, add_pixels_clamped as usize);
        }

        let mut dsp = base;
        dsp.init_riscv(CpuFlags::RVV_I64 | CpuFlags::RV_ZVL128B | CpuFlags::RVB);

        assert_eq!(dsp.put_pixels_clamped as usize, put_pixels_clamped_rvv as usize);
        assert_eq!(dsp.put_signed_pixels_clamped as usize, put_signed_pixels_clamped_rvv as usize);
        assert_eq!(dsp.add_pixels_clamped as usize, add_pixels_clamped_rvv as usize);

        // Re-running the initializer with fewer flags never uninstalls a primitive.
        dsp.init_riscv(CpuFlags::empty());
        assert_eq!(dsp.put_pixels_clamped as usize, put_pixels_clamped_rvv as usize);
    }

    #[test]
    fn verify_rvv_matches_scalar() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_0003);
        let stride = 12;

        for _ in 0..16 {
            let mut block = [0i16; 64];
            for c in block.iter_mut() {
                *c = rng.random_range(-400..400);
            }

            let base: Vec<u8> = (0..8 * stride).map(|_| rng.random()).collect();

            let kernels: [(PutPixelsPair, &str); 3] = [
                ((put_pixels_clamped, put_pixels_clamped_rvv), "put"),
                ((put_signed_pixels_clamped, put_signed_pixels_clamped_rvv), "put_signed"),
                ((add_pixels_clamped, add_pixels_clamped_rvv), "add"),
            ];

            for ((scalar, rvv), name) in kernels {
                let mut expected = base.clone();
                let mut actual = base.clone();

                scalar(&block, &mut expected, stride);
                rvv(&block, &mut actual, stride);

                assert_eq!(expected, actual, "{} mismatch", name);
            }
        }
    }

    type PutPixelsPair = (crate::dsp::idct::PutPixelsFn, crate::dsp::idct::PutPixelsFn);
}
