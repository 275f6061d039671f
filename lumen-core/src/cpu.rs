// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `cpu` module reports the instruction set extensions available to the running process.
//!
//! Detection runs once, on first use. Applications and tests may override the detected set with
//! [`force_cpu_flags`] to pin, or disable, accelerated code paths.

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use log::debug;
use once_cell::sync::Lazy;

bitflags! {
    /// A set of CPU capabilities.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u64 {
        // Arm
        const ARMV8      = 1 << 0;
        const NEON       = 1 << 1;
        const DOTPROD    = 1 << 2;
        const I8MM       = 1 << 3;

        // x86
        const SSE2       = 1 << 8;
        const SSSE3      = 1 << 9;
        const SSE4_1     = 1 << 10;
        const AVX2       = 1 << 11;

        // RISC-V
        /// Base integer instruction set.
        const RVI        = 1 << 16;
        /// Single-precision floating point.
        const RVF        = 1 << 17;
        /// Double-precision floating point.
        const RVD        = 1 << 18;
        /// Address generation, basic bit manipulation, and single-bit instructions (Zba, Zbb, Zbs).
        const RVB        = 1 << 19;
        /// Vector instructions on 8, 16, and 32-bit integers.
        const RVV_I32    = 1 << 20;
        /// Vector instructions on single-precision floats.
        const RVV_F32    = 1 << 21;
        /// Vector instructions on 64-bit integers.
        const RVV_I64    = 1 << 22;
        /// Vector instructions on double-precision floats.
        const RVV_F64    = 1 << 23;
        /// Vector registers are at least 128 bits wide.
        const RV_ZVL128B = 1 << 24;
    }
}

/// Sentinel stored in `FORCED_FLAGS` while no override is active. It sets bits that no valid
/// `CpuFlags` uses.
const NOT_FORCED: u64 = u64::MAX;

static FORCED_FLAGS: AtomicU64 = AtomicU64::new(NOT_FORCED);

static DETECTED_FLAGS: Lazy<CpuFlags> = Lazy::new(|| {
    let flags = detect();
    debug!("detected cpu flags: {:?}", flags);
    flags
});

/// Gets the CPU capabilities dispatch decisions should be based on.
///
/// This is the detected set, unless an override was installed with [`force_cpu_flags`].
pub fn cpu_flags() -> CpuFlags {
    match FORCED_FLAGS.load(Ordering::Relaxed) {
        NOT_FORCED => *DETECTED_FLAGS,
        forced => CpuFlags::from_bits_truncate(forced),
    }
}

/// Gets the detected CPU capabilities, ignoring any override.
pub fn detected_cpu_flags() -> CpuFlags {
    *DETECTED_FLAGS
}

/// Overrides the CPU capabilities returned by [`cpu_flags`], or removes the override if `None`.
///
/// Only dispatch tables constructed after the call are affected.
pub fn force_cpu_flags(flags: Option<CpuFlags>) {
    let value = match flags {
        Some(flags) => {
            debug!("forcing cpu flags: {:?}", flags);
            flags.bits()
        }
        None => NOT_FORCED,
    };

    FORCED_FLAGS.store(value, Ordering::Relaxed);
}

#[cfg(target_arch = "aarch64")]
fn detect() -> CpuFlags {
    use std::arch::is_aarch64_feature_detected;

    // Advanced SIMD is mandatory on AArch64.
    let mut flags = CpuFlags::ARMV8 | CpuFlags::NEON;

    if is_aarch64_feature_detected!("dotprod") {
        flags |= CpuFlags::DOTPROD;
    }
    if is_aarch64_feature_detected!("i8mm") {
        flags |= CpuFlags::I8MM;
    }

    flags
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect() -> CpuFlags {
    let mut flags = CpuFlags::empty();

    if is_x86_feature_detected!("sse2") {
        flags |= CpuFlags::SSE2;
    }
    if is_x86_feature_detected!("ssse3") {
        flags |= CpuFlags::SSSE3;
    }
    if is_x86_feature_detected!("sse4.1") {
        flags |= CpuFlags::SSE4_1;
    }
    if is_x86_feature_detected!("avx2") {
        flags |= CpuFlags::AVX2;
    }

    flags
}

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
fn detect() -> CpuFlags {
    // Runtime feature detection is not available on stable Rust for RISC-V. Report the extensions
    // the crate was compiled for.
    let mut flags = CpuFlags::RVI;

    if cfg!(target_feature = "f") {
        flags |= CpuFlags::RVF;
    }
    if cfg!(target_feature = "d") {
        flags |= CpuFlags::RVD;
    }
    if cfg!(all(target_feature = "zba", target_feature = "zbb", target_feature = "zbs")) {
        flags |= CpuFlags::RVB;
    }
    if cfg!(target_feature = "v") {
        // The V extension implies Zve64d and Zvl128b.
        flags |= CpuFlags::RVV_I32
            | CpuFlags::RVV_F32
            | CpuFlags::RVV_I64
            | CpuFlags::RVV_F64
            | CpuFlags::RV_ZVL128B;
    }

    flags
}

#[cfg(not(any(
    target_arch = "aarch64",
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "riscv32",
    target_arch = "riscv64"
)))]
fn detect() -> CpuFlags {
    CpuFlags::empty()
}
