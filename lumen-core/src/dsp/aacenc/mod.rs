// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AAC encoder quantization primitives.

use crate::cpu::{cpu_flags, CpuFlags};

pub mod riscv;

/// Stores `|x|^(3/4)` for every input sample.
pub type AbsPow34Fn = fn(out: &mut [f32], input: &[f32]);

/// Quantizes the pre-scaled (`|x|^(3/4)`) coefficients of a band.
///
/// Every output is `min(scaled * q34 + rounding, maxval)` truncated towards zero, negated if
/// `is_signed` and the corresponding input is negative.
pub type QuantBandsFn = fn(
    out: &mut [i32],
    input: &[f32],
    scaled: &[f32],
    is_signed: bool,
    maxval: i32,
    q34: f32,
    rounding: f32,
);

/// Dispatch table for AAC encoder primitives.
#[derive(Copy, Clone)]
pub struct AacEncDsp {
    pub abs_pow34: AbsPow34Fn,
    pub quant_bands: QuantBandsFn,
}

impl AacEncDsp {
    /// Instantiate a dispatch table using the CPU flags of the running process.
    pub fn new() -> Self {
        AacEncDsp::with_flags(cpu_flags())
    }

    /// Instantiate a dispatch table considering only the given CPU flags.
    pub fn with_flags(flags: CpuFlags) -> Self {
        let mut dsp = AacEncDsp { abs_pow34, quant_bands };

        if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
            dsp.init_riscv(flags);
        }

        dsp
    }
}

impl Default for AacEncDsp {
    fn default() -> Self {
        AacEncDsp::new()
    }
}

#[inline(always)]
pub(crate) fn pow34(x: f32) -> f32 {
    let a = x.abs();
    (a * a.sqrt()).sqrt()
}

#[inline(always)]
pub(crate) fn quantize(input: f32, scaled: f32, is_signed: bool, maxval: i32, q34: f32, rounding: f32) -> i32 {
    let qc = scaled * q34;
    let q = (qc + rounding).min(maxval as f32) as i32;

    if is_signed && input < 0.0 {
        -q
    }
    else {
        q
    }
}

pub fn abs_pow34(out: &mut [f32], input: &[f32]) {
    for (o, &x) in out.iter_mut().zip(input) {
        *o = pow34(x);
    }
}

pub fn quant_bands(
    out: &mut [i32],
    input: &[f32],
    scaled: &[f32],
    is_signed: bool,
    maxval: i32,
    q34: f32,
    rounding: f32,
) {
    for ((o, &x), &s) in out.iter_mut().zip(input).zip(scaled) {
        *o = quantize(x, s, is_signed, maxval, q34, rounding);
    }
}
