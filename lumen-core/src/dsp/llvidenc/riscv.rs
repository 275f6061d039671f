// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RISC-V vector (RVV) lossless video encoder primitives.

use super::LlvidEncDsp;
use crate::cpu::CpuFlags;

/// Elements processed per strip. The smallest legal vector (Zve32x, VLEN 32) at LMUL 8.
const STRIP_LEN: usize = 32;

impl LlvidEncDsp {
    /// Installs the RVV primitives permitted by `flags`.
    pub fn init_riscv(&mut self, flags: CpuFlags) {
        if flags.contains(CpuFlags::RVV_I32) {
            self.diff_bytes = diff_bytes_rvv;
        }
    }
}

/// Strip-mined byte difference: full strips first, then a single tail strip.
pub fn diff_bytes_rvv(dst: &mut [u8], src1: &[u8], src2: &[u8]) {
    let len = dst.len().min(src1.len()).min(src2.len());
    let full = len - len % STRIP_LEN;

    let (dst_body, dst_tail) = dst[..len].split_at_mut(full);

    for ((d, a), b) in dst_body
        .chunks_exact_mut(STRIP_LEN)
        .zip(src1[..full].chunks_exact(STRIP_LEN))
        .zip(src2[..full].chunks_exact(STRIP_LEN))
    {
        let mut strip = [0u8; STRIP_LEN];
        for (lane, s) in strip.iter_mut().enumerate() {
            *s = a[lane].wrapping_sub(b[lane]);
        }
        d.copy_from_slice(&strip);
    }

    for ((d, &a), &b) in dst_tail.iter_mut().zip(&src1[full..len]).zip(&src2[full..len]) {
        *d = a.wrapping_sub(b);
    }
}
