// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lossless video encoder prediction primitives.

use crate::cpu::{cpu_flags, CpuFlags};

pub mod riscv;

/// Stores `src1 - src2` (modulo 256) for every byte of `dst`.
pub type DiffBytesFn = fn(dst: &mut [u8], src1: &[u8], src2: &[u8]);

/// Stores the median prediction residual of `src2` (the current row) given `src1` (the row above).
/// `left` and `left_top` carry the prediction context across calls.
pub type SubMedianPredFn =
    fn(dst: &mut [u8], src1: &[u8], src2: &[u8], left: &mut u8, left_top: &mut u8);

/// Stores the left prediction residual of a `width` x `height` picture, rows `stride` bytes apart,
/// into the packed `dst`.
pub type SubLeftPredictFn =
    fn(dst: &mut [u8], src: &[u8], stride: usize, width: usize, height: usize);

/// Dispatch table for lossless video encoder primitives.
#[derive(Copy, Clone)]
pub struct LlvidEncDsp {
    pub diff_bytes: DiffBytesFn,
    pub sub_median_pred: SubMedianPredFn,
    pub sub_left_predict: SubLeftPredictFn,
}

impl LlvidEncDsp {
    /// Instantiate a dispatch table using the CPU flags of the running process.
    pub fn new() -> Self {
        LlvidEncDsp::with_flags(cpu_flags())
    }

    /// Instantiate a dispatch table considering only the given CPU flags.
    pub fn with_flags(flags: CpuFlags) -> Self {
        let mut dsp = LlvidEncDsp { diff_bytes, sub_median_pred, sub_left_predict };

        if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
            dsp.init_riscv(flags);
        }

        dsp
    }
}

impl Default for LlvidEncDsp {
    fn default() -> Self {
        LlvidEncDsp::new()
    }
}

pub fn diff_bytes(dst: &mut [u8], src1: &[u8], src2: &[u8]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src1).zip(src2) {
        *d = a.wrapping_sub(b);
    }
}

/// Median of three.
#[inline(always)]
fn mid_pred(a: u8, b: u8, c: u8) -> u8 {
    a.max(b).min(a.min(b).max(c))
}

pub fn sub_median_pred(dst: &mut [u8], src1: &[u8], src2: &[u8], left: &mut u8, left_top: &mut u8) {
    let mut l = *left;
    let mut lt = *left_top;

    for ((d, &top), &cur) in dst.iter_mut().zip(src1).zip(src2) {
        let gradient = l.wrapping_add(top).wrapping_sub(lt);
        let pred = mid_pred(l, top, gradient);

        lt = top;
        l = cur;
        *d = cur.wrapping_sub(pred);
    }

    *left = l;
    *left_top = lt;
}

pub fn sub_left_predict(dst: &mut [u8], src: &[u8], stride: usize, width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }

    let mut prev = 0x80u8;

    for (row, out) in dst.chunks_exact_mut(width).take(height).enumerate() {
        for (d, &s) in out.iter_mut().zip(&src[row * stride..row * stride + width]) {
            *d = s.wrapping_sub(prev);
            prev = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_mid_pred() {
        assert_eq!(mid_pred(1, 2, 3), 2);
        assert_eq!(mid_pred(3, 1, 2), 2);
        assert_eq!(mid_pred(2, 3, 1), 2);
        assert_eq!(mid_pred(7, 7, 0), 7);
    }

    #[test]
    fn verify_diff_bytes() {
        let mut dst = [0u8; 4];
        diff_bytes(&mut dst, &[10, 0, 255, 128], &[3, 1, 255, 129]);
        assert_eq!(dst, [7, 255, 0, 255]);
    }

    #[test]
    fn verify_sub_median_pred() {
        let top = [10u8, 20, 30, 40];
        let cur = [12u8, 18, 35, 41];

        let mut dst = [0u8; 4];
        let mut left = 0;
        let mut left_top = 0;

        sub_median_pred(&mut dst, &top, &cur, &mut left, &mut left_top);

        // i=0: l=0, t=10, lt=0 -> grad 10, pred mid(0, 10, 10) = 10
        // i=1: l=12, t=20, lt=10 -> grad 22, pred mid(12, 20, 22) = 20
        // i=2: l=18, t=30, lt=20 -> grad 28, pred mid(18, 30, 28) = 28
        // i=3: l=35, t=40, lt=30 -> grad 45, pred mid(35, 40, 45) = 40
        assert_eq!(dst, [2, 254, 7, 1]);
        assert_eq!(left, 41);
        assert_eq!(left_top, 40);
    }

    #[test]
    fn verify_sub_left_predict() {
        let src = [0x80u8, 0x81, 0xff, 0x00, 0x10, 0x20, 0xee, 0xee];
        let mut dst = [0u8; 4];

        // 2x2 picture with 2 bytes of row padding. Prediction continues across rows.
        sub_left_predict(&mut dst, &src, 4, 2, 2);
        assert_eq!(dst, [0x00, 0x01, 0x8f, 0x10]);
    }

    #[test]
    fn verify_sub_left_predict_empty() {
        let mut dst = [0u8; 4];

        sub_left_predict(&mut dst, &[1; 4], 4, 0, 1);
        sub_left_predict(&mut dst, &[1; 4], 4, 4, 0);
        assert_eq!(dst, [0; 4]);
    }

    #[test]
    fn verify_scalar_defaults() {
        let dsp = LlvidEncDsp::with_flags(CpuFlags::empty());

        assert_eq!(dsp.diff_bytes as usize, diff_bytes as usize);
        assert_eq!(dsp.sub_median_pred as usize, sub_median_pred as usize);
        assert_eq!(dsp.sub_left_predict as usize, sub_left_predict as usize);
    }
}
