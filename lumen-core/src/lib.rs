// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project Lumen shared structs, traits, and features.
//!
//! **This crate is part of Lumen. Please use the umbrella crates `lumen-codec-dovi` and
//! `lumen-common` instead of depending on this crate directly.**

pub mod checksum;
pub mod codecs;
pub mod cpu;
pub mod dsp;
pub mod errors;
pub mod io;
pub mod units;
pub mod util;
pub mod video;
