// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frequency domain FIR filtering primitives.

use crate::cpu::{cpu_flags, CpuFlags};

pub mod riscv;

/// Accumulates the element-wise complex product of the spectra `t` and `c` into `sum`.
///
/// The spectra hold `len` interleaved complex bins followed by one real (Nyquist) bin, so every
/// slice must hold at least `2 * len + 1` samples.
pub type FcmulAddFn = fn(sum: &mut [f32], t: &[f32], c: &[f32], len: usize);

/// Dispatch table for frequency domain FIR filtering primitives.
#[derive(Copy, Clone)]
pub struct AfirDsp {
    pub fcmul_add: FcmulAddFn,
}

impl AfirDsp {
    /// Instantiate a dispatch table using the CPU flags of the running process.
    pub fn new() -> Self {
        AfirDsp::with_flags(cpu_flags())
    }

    /// Instantiate a dispatch table considering only the given CPU flags.
    pub fn with_flags(flags: CpuFlags) -> Self {
        let mut dsp = AfirDsp { fcmul_add };

        if cfg!(any(target_arch = "riscv32", target_arch = "riscv64")) {
            dsp.init_riscv(flags);
        }

        dsp
    }
}

impl Default for AfirDsp {
    fn default() -> Self {
        AfirDsp::new()
    }
}

pub fn fcmul_add(sum: &mut [f32], t: &[f32], c: &[f32], len: usize) {
    assert!(sum.len() > 2 * len && t.len() > 2 * len && c.len() > 2 * len);

    for n in 0..len {
        let cre = c[2 * n];
        let cim = c[2 * n + 1];
        let tre = t[2 * n];
        let tim = t[2 * n + 1];

        sum[2 * n] += tre * cre - tim * cim;
        sum[2 * n + 1] += tre * cim + tim * cre;
    }

    sum[2 * len] += t[2 * len] * c[2 * len];
}
