// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RISC-V vector (RVV) AAC encoder primitives.

use super::{pow34, quantize, AacEncDsp};
use crate::cpu::CpuFlags;

/// Elements processed per strip. The smallest legal single-precision vector at LMUL 8.
const STRIP_LEN: usize = 8;

impl AacEncDsp {
    /// Installs the RVV primitives permitted by `flags`. Requires single-precision vector and
    /// bit manipulation support.
    pub fn init_riscv(&mut self, flags: CpuFlags) {
        if flags.contains(CpuFlags::RVV_F32) && flags.contains(CpuFlags::RVB) {
            self.abs_pow34 = abs_pow34_rvv;
            self.quant_bands = quant_bands_rvv;
        }
    }
}

pub fn abs_pow34_rvv(out: &mut [f32], input: &[f32]) {
    let len = out.len().min(input.len());

    for (o, x) in out[..len].chunks_mut(STRIP_LEN).zip(input[..len].chunks(STRIP_LEN)) {
        let mut strip = [0f32; STRIP_LEN];
        for (s, &v) in strip.iter_mut().zip(x) {
            *s = pow34(v);
        }
        o.copy_from_slice(&strip[..o.len()]);
    }
}

pub fn quant_bands_rvv(
    out: &mut [i32],
    input: &[f32],
    scaled: &[f32],
    is_signed: bool,
    maxval: i32,
    q34: f32,
    rounding: f32,
) {
    let len = out.len().min(input.len()).min(scaled.len());

    for ((o, x), s) in out[..len]
        .chunks_mut(STRIP_LEN)
        .zip(input[..len].chunks(STRIP_LEN))
        .zip(scaled[..len].chunks(STRIP_LEN))
    {
        let mut strip = [0i32; STRIP_LEN];
        for ((q, &x), &s) in strip.iter_mut().zip(x).zip(s) {
            *q = quantize(x, s, is_signed, maxval, q34, rounding);
        }
        o.copy_from_slice(&strip[..o.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::aacenc::{abs_pow34, quant_bands};

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn verify_rvv_gating() {
        let base = AacEncDsp::with_flags(CpuFlags::empty());

        for flags in [CpuFlags::RVV_F32, CpuFlags::RVB, CpuFlags::RVV_I32 | CpuFlags::RVB] {
            let mut dsp = base;
            dsp.init_riscv(flags);
            assert_eq!(dsp.abs_pow34 as usize, abs_pow34 as usize);
            assert_eq!(dsp.quant_bands as usize, quant_bands as usize);
        }

        let mut dsp = base;
        dsp.init_riscv(CpuFlags::RVV_F32 | CpuFlags::RVB);
        assert_eq!(dsp.abs_pow34 as usize, abs_pow34_rvv as usize);
        assert_eq!(dsp.quant_bands as usize, quant_bands_rvv as usize);
    }

    #[test]
    fn verify_rvv_matches_scalar() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_0005);

        for len in [1, 7, 8, 9, 64, 1024] {
            let input: Vec<f32> = (0..len).map(|_| rng.random_range(-32768.0..32768.0)).collect();

            let mut expected = vec![0f32; len];
            let mut actual = vec![0f32; len];

            abs_pow34(&mut expected, &input);
            abs_pow34_rvv(&mut actual, &input);
            assert_eq!(expected, actual);

            let scaled = expected.clone();

            let mut expected = vec![0i32; len];
            let mut actual = vec![0i32; len];

            for is_signed in [false, true] {
                quant_bands(&mut expected, &input, &scaled, is_signed, 8191, 0.37, 0.4054);
                quant_bands_rvv(&mut actual, &input, &scaled, is_signed, 8191, 0.37, 0.4054);
                assert_eq!(expected, actual);
            }
        }
    }
}
