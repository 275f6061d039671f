// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dsp` module provides small, hot, signal processing primitives behind dispatch tables.
//!
//! Every table is a plain record of function pointers. Constructing a table installs the portable
//! scalar implementation of every primitive, then lets the initializer of the target architecture
//! replace individual primitives with accelerated implementations when the CPU flags allow it.
//! Accelerated implementations always produce results identical to the scalar implementation.
//!
//! Tables are `Copy` and are never modified after construction, so they may be freely shared
//! between threads.

pub mod aacenc;
pub mod afir;
pub mod idct;
pub mod llvidenc;
pub mod pixblock;
