// Lumen
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use smallvec::SmallVec;

use lumen_common::mpeg::video::DoviDecoderConfigurationRecord;
use lumen_core::errors::{limit_error, Result};
use lumen_core::video::dovi::{ColorMetadata, DataMapping, DmData, DoviMetadata, RpuDataHeader};
use lumen_core::video::{FrameSideData, VideoFrame};

use crate::{extension_is_static, DoviEnable, COLOR_DEFAULT};
use crate::{DOVI_MAX_DM_ID, DOVI_MAX_DYNAMIC_EXT_BLOCKS, DOVI_MAX_STATIC_EXT_BLOCKS};

/// The extension blocks of the current RPU, split into static and dynamic blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoviExt {
    dm_static: SmallVec<[DmData; DOVI_MAX_STATIC_EXT_BLOCKS]>,
    dm_dynamic: SmallVec<[DmData; DOVI_MAX_DYNAMIC_EXT_BLOCKS]>,
}

impl DoviExt {
    pub fn num_static(&self) -> usize {
        self.dm_static.len()
    }

    pub fn num_dynamic(&self) -> usize {
        self.dm_dynamic.len()
    }

    /// Gets the static blocks (levels 6, 10, 32, 254, and 255).
    pub fn static_blocks(&self) -> &[DmData] {
        &self.dm_static
    }

    /// Gets the dynamic blocks.
    pub fn dynamic_blocks(&self) -> &[DmData] {
        &self.dm_dynamic
    }

    /// Iterates over all blocks, static blocks first.
    pub fn iter(&self) -> impl Iterator<Item = &DmData> + '_ {
        self.dm_static.iter().chain(self.dm_dynamic.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.dm_static.is_empty() && self.dm_dynamic.is_empty()
    }

    /// Adds a block to the static or dynamic set according to its level.
    pub(crate) fn push(&mut self, block: DmData) -> Result<()> {
        if extension_is_static(block.level()) {
            if self.dm_static.len() >= DOVI_MAX_STATIC_EXT_BLOCKS {
                return limit_error("dovi: too many static extension blocks");
            }
            self.dm_static.push(block);
        }
        else {
            if self.dm_dynamic.len() >= DOVI_MAX_DYNAMIC_EXT_BLOCKS {
                return limit_error("dovi: too many dynamic extension blocks");
            }
            self.dm_dynamic.push(block);
        }
        Ok(())
    }

    pub(crate) fn clear_static(&mut self) {
        self.dm_static.clear();
    }

    pub(crate) fn clear_dynamic(&mut self) {
        self.dm_dynamic.clear();
    }
}

/// Which color metadata the context currently exposes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum ColorView {
    #[default]
    None,
    /// The RPU carried no display management data: [`COLOR_DEFAULT`] applies.
    Default,
    /// The color metadata held in the `dm` slot.
    Dm,
}

/// The Dolby Vision RPU context of a stream.
///
/// A default-constructed context is empty and ready for use. Set `cfg` to the configuration
/// record of the stream before parsing, or call [`DoviContext::configure_ext`] before generating.
///
/// Data mappings, color metadata, and extension blocks are reference counted and never mutated
/// once published, so contexts sharing them through [`DoviContext::replace`] each observe a
/// stable snapshot.
#[derive(Debug, Default)]
pub struct DoviContext {
    /// Label prefixed to every log message of this context.
    pub logctx: Option<Arc<str>>,
    /// Whether an encoder writes Dolby Vision metadata.
    pub enable: DoviEnable,
    /// The active decoder configuration record.
    pub cfg: DoviDecoderConfigurationRecord,
    pub(crate) header: RpuDataHeader,
    /// Index of the `vdr` slot holding the active data mapping.
    pub(crate) mapping: Option<usize>,
    pub(crate) color: ColorView,
    pub(crate) ext_blocks: Option<Arc<DoviExt>>,
    pub(crate) dm: Option<Arc<ColorMetadata>>,
    pub(crate) vdr: [Option<Arc<DataMapping>>; DOVI_MAX_DM_ID + 1],
    pub(crate) rpu_buf: Vec<u8>,
}

impl DoviContext {
    /// Instantiate an empty context whose log messages are prefixed with `label`.
    pub fn new(label: &str) -> Self {
        DoviContext { logctx: Some(Arc::from(label)), ..Default::default() }
    }

    pub(crate) fn label(&self) -> &str {
        self.logctx.as_deref().unwrap_or("dovi")
    }

    /// Gets the header of the most recently parsed or generated RPU.
    pub fn header(&self) -> &RpuDataHeader {
        &self.header
    }

    /// Gets the active data mapping, if any.
    pub fn mapping(&self) -> Option<&DataMapping> {
        self.mapping.and_then(|id| self.vdr[id].as_deref())
    }

    /// Gets the active color metadata, if any.
    pub fn color(&self) -> Option<&ColorMetadata> {
        match self.color {
            ColorView::None => None,
            ColorView::Default => Some(&COLOR_DEFAULT),
            ColorView::Dm => self.dm.as_deref(),
        }
    }

    /// Gets the extension blocks of the most recent RPU, if any.
    pub fn ext_blocks(&self) -> Option<&DoviExt> {
        self.ext_blocks.as_deref()
    }

    /// Gets the data mapping stored in slot `id`.
    pub fn vdr(&self, id: usize) -> Option<&DataMapping> {
        self.vdr.get(id).and_then(|slot| slot.as_deref())
    }

    /// Gets the number of bytes allocated for the RPU scratch buffer.
    pub fn rpu_buf_capacity(&self) -> usize {
        self.rpu_buf.capacity()
    }

    /// Replaces the state of this context with that of `src`, sharing every reference counted slot.
    /// The log label of this context is kept.
    pub fn replace(&mut self, src: &DoviContext) {
        self.enable = src.enable;
        self.cfg = src.cfg;
        self.header = src.header.clone();
        self.mapping = src.mapping;
        self.color = src.color;
        self.ext_blocks.clone_from(&src.ext_blocks);
        self.dm.clone_from(&src.dm);
        self.vdr.clone_from(&src.vdr);
    }

    /// Releases all state, including the scratch buffer. Only the log label is kept.
    pub fn unref(&mut self) {
        let logctx = self.logctx.take();
        *self = DoviContext { logctx, ..Default::default() };
    }

    /// Releases all per-frame state. The configuration, enable state, log label, and scratch
    /// buffer are kept.
    pub fn flush(&mut self) {
        self.header = Default::default();
        self.mapping = None;
        self.color = ColorView::None;
        self.ext_blocks = None;
        self.dm = None;
        self.vdr = Default::default();
    }

    /// Gets a self-contained copy of the current metadata. Returns `None` if either the data
    /// mapping or the color metadata is unknown.
    pub fn get_metadata(&self) -> Option<DoviMetadata> {
        let mapping = self.mapping()?;
        let color = self.color()?;

        let ext_blocks = match self.ext_blocks() {
            Some(ext) => ext.iter().copied().collect(),
            None => Vec::new(),
        };

        Some(DoviMetadata {
            header: self.header.clone(),
            mapping: mapping.clone(),
            color: color.clone(),
            ext_blocks,
        })
    }

    /// Attaches the current metadata to `frame`, replacing any Dolby Vision metadata already
    /// attached. Does nothing if there is no metadata.
    pub fn attach_side_data(&self, frame: &mut VideoFrame) -> Result<()> {
        if let Some(metadata) = self.get_metadata() {
            frame.replace_side_data(FrameSideData::DoviMetadata(Box::new(metadata)));
        }
        Ok(())
    }
}
