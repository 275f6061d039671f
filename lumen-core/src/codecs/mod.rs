// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module provides the codec parameters and options shared by all video codec
//! components.

use bitflags::bitflags;

pub mod video;

bitflags! {
    /// `ErrorRecognition` selects which classes of bitstream errors a decoder checks for, and how
    /// it reacts to them.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ErrorRecognition: u32 {
        /// Verify embedded CRCs.
        const CRCCHECK   = 1 << 0;
        /// Detect bitstream syntax deviations.
        const BITSTREAM  = 1 << 1;
        /// Detect improper bitstream length.
        const BUFFER     = 1 << 2;
        /// Abort decoding on minor error detection.
        const EXPLODE    = 1 << 3;
        /// Ignore errors and continue.
        const IGNORE_ERR = 1 << 15;
        /// Consider things that violate the standard and have not been seen in the wild as
        /// errors.
        const CAREFUL    = 1 << 16;
        /// Consider all standard non-compliances as errors.
        const COMPLIANT  = (1 << 17) | Self::CAREFUL.bits();
        /// Consider things that a sane encoder should not do as an error.
        const AGGRESSIVE = (1 << 18) | Self::COMPLIANT.bits();
    }
}

impl ErrorRecognition {
    /// Returns true if stream consistency checks beyond basic well-formedness are requested.
    pub fn is_careful(&self) -> bool {
        self.intersects(ErrorRecognition::CAREFUL | ErrorRecognition::COMPLIANT)
    }

    /// Returns true if questionable but decodable constructs should be treated as errors.
    pub fn is_aggressive(&self) -> bool {
        self.contains(ErrorRecognition::AGGRESSIVE) || self.contains(ErrorRecognition::EXPLODE)
    }
}

/// `Compliance` is the degree to which an encoder adheres to the official standards. Variants are
/// ordered from most permissive to most strict.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Compliance {
    /// Allow non-standardized experimental things.
    Experimental = -2,
    /// Allow unofficial extensions.
    Unofficial = -1,
    /// Follow the standards, allowing common practice deviations.
    #[default]
    Normal = 0,
    /// Strictly conform to all the things in the standards.
    Strict = 1,
    /// Strictly conform to an older, more strict, version of the standards.
    VeryStrict = 2,
}
