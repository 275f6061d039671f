// Lumen
// Copyright (c) 2019-2022 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project Lumen utilities shared between codecs and formats.

pub mod mpeg;
