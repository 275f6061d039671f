// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pixel block primitives: loading 8x8 blocks of pixels into coefficient blocks.

use crate::cpu::{cpu_flags, CpuFlags};

pub mod aarch64;

/// Loads an 8x8 block of pixels, `stride` bytes apart, into `block`.
pub type GetPixelsFn = fn(block: &mut [i16; 64], pixels: &[u8], stride: usize);

/// Stores the difference of two 8x8 blocks of 8-bit pixels, `stride` bytes apart, into `block`.
pub type DiffPixelsFn = fn(block: &mut [i16; 64], s1: &[u8], s2: &[u8], stride: usize);

/// Dispatch table for pixel block primitives.
#[derive(Copy, Clone)]
pub struct PixblockDsp {
    pub get_pixels: GetPixelsFn,
    /// As `get_pixels`, but `pixels` is not required to be 8-byte aligned.
    pub get_pixels_unaligned: GetPixelsFn,
    pub diff_pixels: DiffPixelsFn,
    /// As `diff_pixels`, but `s1` and `s2` are not required to be 8-byte aligned.
    pub diff_pixels_unaligned: DiffPixelsFn,
}

impl PixblockDsp {
    /// Instantiate a dispatch table for pixels of `bits_per_raw_sample` bits using the CPU flags
    /// of the running process.
    pub fn new(bits_per_raw_sample: u32) -> Self {
        PixblockDsp::with_flags(cpu_flags(), bits_per_raw_sample)
    }

    /// Instantiate a dispatch table for pixels of `bits_per_raw_sample` bits, considering only the
    /// given CPU flags.
    pub fn with_flags(flags: CpuFlags, bits_per_raw_sample: u32) -> Self {
        let high_bit_depth = bits_per_raw_sample > 8;

        // Samples deeper than 8 bits are stored in 16-bit words.
        let get_pixels: GetPixelsFn = match bits_per_raw_sample {
            9 | 10 | 12 | 14 => get_pixels_16,
            _ => get_pixels_8,
        };

        let mut dsp = PixblockDsp {
            get_pixels,
            get_pixels_unaligned: get_pixels,
            diff_pixels: diff_pixels_8,
            diff_pixels_unaligned: diff_pixels_8,
        };

        if cfg!(target_arch = "aarch64") {
            dsp.init_aarch64(flags, high_bit_depth);
        }

        dsp
    }
}

/// Scalar 8x8 load of 8-bit pixels.
pub fn get_pixels_8(block: &mut [i16; 64], pixels: &[u8], stride: usize) {
    for (row, out) in block.chunks_exact_mut(8).enumerate() {
        let src = &pixels[row * stride..row * stride + 8];

        for (o, &p) in out.iter_mut().zip(src) {
            *o = i16::from(p);
        }
    }
}

/// Scalar 8x8 load of 16-bit (native endian) pixels. `stride` is in bytes.
pub fn get_pixels_16(block: &mut [i16; 64], pixels: &[u8], stride: usize) {
    for (row, out) in block.chunks_exact_mut(8).enumerate() {
        let src = &pixels[row * stride..row * stride + 16];

        for (o, p) in out.iter_mut().zip(src.chunks_exact(2)) {
            *o = u16::from_ne_bytes([p[0], p[1]]) as i16;
        }
    }
}

/// Scalar 8x8 difference of 8-bit pixels.
pub fn diff_pixels_8(block: &mut [i16; 64], s1: &[u8], s2: &[u8], stride: usize) {
    for (row, out) in block.chunks_exact_mut(8).enumerate() {
        let a = &s1[row * stride..row * stride + 8];
        let b = &s2[row * stride..row * stride + 8];

        for ((o, &a), &b) in out.iter_mut().zip(a).zip(b) {
            *o = i16::from(a) - i16::from(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_plane(rng: &mut SmallRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.random()).collect()
    }

    #[test]
    fn verify_scalar_defaults() {
        let dsp = PixblockDsp::with_flags(CpuFlags::empty(), 8);

        assert_eq!(dsp.get_pixels as usize, get_pixels_8 as usize);
        assert_eq!(dsp.get_pixels_unaligned as usize, get_pixels_8 as usize);
        assert_eq!(dsp.diff_pixels as usize, diff_pixels_8 as usize);
        assert_eq!(dsp.diff_pixels_unaligned as usize, diff_pixels_8 as usize);

        let dsp = PixblockDsp::with_flags(CpuFlags::empty(), 10);

        assert_eq!(dsp.get_pixels as usize, get_pixels_16 as usize);
        assert_eq!(dsp.get_pixels_unaligned as usize, get_pixels_16 as usize);
    }

    #[test]
    fn verify_get_pixels() {
        let stride = 13;
        let pixels: Vec<u8> = (0..(7 * stride + 8) as u32).map(|i| (i * 7) as u8).collect();

        let mut block = [0i16; 64];
        get_pixels_8(&mut block, &pixels, stride);

        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(block[row * 8 + col], i16::from(pixels[row * stride + col]));
            }
        }

        // 16-bit pixels.
        let stride = 20;
        let mut pixels = vec![0u8; 7 * stride + 16];
        pixels[stride + 2..stride + 4].copy_from_slice(&1023u16.to_ne_bytes());

        get_pixels_16(&mut block, &pixels, stride);

        assert_eq!(block[9], 1023);
        assert_eq!(block.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn verify_diff_pixels() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_0001);

        let stride = 16;
        let s1 = random_plane(&mut rng, 8 * stride);
        let s2 = random_plane(&mut rng, 8 * stride);

        let mut block = [0i16; 64];
        diff_pixels_8(&mut block, &s1, &s2, stride);

        for row in 0..8 {
            for col in 0..8 {
                let expected = i16::from(s1[row * stride + col]) - i16::from(s2[row * stride + col]);
                assert_eq!(block[row * 8 + col], expected);
            }
        }
    }
}
