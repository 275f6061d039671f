// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inverse transform output primitives: storing 8x8 coefficient blocks into 8-bit pixels with
//! saturation.

use crate::cpu::{cpu_flags, CpuFlags};

pub mod riscv;

/// Stores an 8x8 block into pixels `stride` bytes apart.
pub type PutPixelsFn = fn(block: &[i16; 64], pixels: &mut [u8], stride: usize);

/// Dispatch table for inverse transform output primitives.
#[derive(Copy, Clone)]
pub struct IdctDsp {
    /// Stores `clamp(block, 0, 255)`.
    pub put_pixels_clamped: PutPixelsFn,
    /// Stores `clamp(block + 128, 0, 255)`.
    pub put_signed_pixels_clamped: PutPixelsFn,
    /// Stores `clamp(pixels + block, 0, 255)`.
    pub add_pixels_clamped: PutPixelsFn,
}

impl IdctDsp {
    /// Instantiate a dispatch table using the CPU flags of the running process.
    pub fn new() -> Self {
        IdctDsp::with_flags(cpu_flags())
    }

    /// Instantiate a dispatch table considering only the given CPU flags.
    pub fn with_flags(flags: CpuFlags) -> Self {
        let mut dsp = IdctDsp {
            put_pixels_clamped,
            put_signed_pixels_clamped,
            add_pixels_clamped,
        };

        if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
            dsp.init_riscv(flags);
        }

        dsp
    }
}

impl Default for IdctDsp {
    fn default() -> Self {
        IdctDsp::new()
    }
}

#[inline(always)]
fn clip_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub fn put_pixels_clamped(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    for (row, coefs) in block.chunks_exact(8).enumerate() {
        let dst = &mut pixels[row * stride..row * stride + 8];

        for (d, &c) in dst.iter_mut().zip(coefs) {
            *d = clip_u8(i32::from(c));
        }
    }
}

pub fn put_signed_pixels_clamped(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    for (row, coefs) in block.chunks_exact(8).enumerate() {
        let dst = &mut pixels[row * stride..row * stride + 8];

        for (d, &c) in dst.iter_mut().zip(coefs) {
            *d = clip_u8(i32::from(c) + 128);
        }
    }
}

pub fn add_pixels_clamped(block: &[i16; 64], pixels: &mut [u8], stride: usize) {
    for (row, coefs) in block.chunks_exact(8).enumerate() {
        let dst = &mut pixels[row * stride..row * stride + 8];

        for (d, &c) in dst.iter_mut().zip(coefs) {
            *d = clip_u8(i32::from(*d) + i32::from(c));
        }
    }
}
