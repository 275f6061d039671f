// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RISC-V vector (RVV) frequency domain FIR filtering primitives.

use super::AfirDsp;
use crate::cpu::CpuFlags;

/// Complex bins processed per strip. Segment loads de-interleave each strip into real and
/// imaginary vectors.
const STRIP_BINS: usize = 4;

impl AfirDsp {
    /// Installs the RVV primitives permitted by `flags`. Requires double-precision vector and
    /// bit manipulation support.
    pub fn init_riscv(&mut self, flags: CpuFlags) {
        if flags.contains(CpuFlags::RVV_F64) && flags.contains(CpuFlags::RVB) {
            self.fcmul_add = fcmul_add_rvv;
        }
    }
}

pub fn fcmul_add_rvv(sum: &mut [f32], t: &[f32], c: &[f32], len: usize) {
    assert!(sum.len() > 2 * len && t.len() > 2 * len && c.len() > 2 * len);

    let bins = 2 * len;

    for ((s, t), c) in sum[..bins]
        .chunks_mut(2 * STRIP_BINS)
        .zip(t[..bins].chunks(2 * STRIP_BINS))
        .zip(c[..bins].chunks(2 * STRIP_BINS))
    {
        let n = s.len() / 2;

        // vlseg2e32
        let mut tre = [0f32; STRIP_BINS];
        let mut tim = [0f32; STRIP_BINS];
        let mut cre = [0f32; STRIP_BINS];
        let mut cim = [0f32; STRIP_BINS];

        for i in 0..n {
            tre[i] = t[2 * i];
            tim[i] = t[2 * i + 1];
            cre[i] = c[2 * i];
            cim[i] = c[2 * i + 1];
        }

        for i in 0..n {
            s[2 * i] += tre[i] * cre[i] - tim[i] * cim[i];
            s[2 * i + 1] += tre[i] * cim[i] + tim[i] * cre[i];
        }
    }

    sum[bins] += t[bins] * c[bins];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::afir::fcmul_add;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn verify_rvv_gating() {
        let base = AfirDsp::with_flags(CpuFlags::empty());

        for flags in [CpuFlags::RVV_F64, CpuFlags::RVB | CpuFlags::RVV_F32] {
            let mut dsp = base;
            dsp.init_riscv(flags);
            assert_eq!(dsp.fcmul_add as usize, fcmul_add as usize);
        }

        let mut dsp = base;
        dsp.init_riscv(CpuFlags::RVV_F64 | CpuFlags::RVB);
        assert_eq!(dsp.fcmul_add as usize, fcmul_add_rvv as usize);
    }

    #[test]
    fn verify_rvv_matches_scalar() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_0006);

        for len in [0, 1, 3, 4, 5, 256] {
            let n = 2 * len + 1;
            let t: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
            let c: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
            let init: Vec<f32> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();

            let mut expected = init.clone();
            let mut actual = init;

            fcmul_add(&mut expected, &t, &c, len);
            fcmul_add_rvv(&mut actual, &t, &c, len);

            assert_eq!(expected, actual);
        }
    }
}
