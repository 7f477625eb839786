// This file is part of Nitrogen.
//
// Nitrogen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Nitrogen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Nitrogen.  If not, see <http://www.gnu.org/licenses/>.
use bitflags::bitflags;
use std::path::{Path, PathBuf};

bitflags! {
    /// Extra and skipped outputs, for looking inside the pipeline.
    pub struct DebugOutputs: u32 {
        const SAVE_GROUND_IRRADIANCE = 1 << 0;
        const SAVE_SCAT_DENSITY = 1 << 1;
        const SAVE_SCAT_DENSITY_ORDER2_FROM_GROUND = 1 << 2;
        const SAVE_DELTA_SCATTERING = 1 << 3;
        const SAVE_ACCUM_SCATTERING = 1 << 4;
        const NO_SAVE_TEXTURES = 1 << 5;
        const NO_EDS_TEXTURES = 1 << 6;
    }
}

impl Default for DebugOutputs {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PrecomputeOptions {
    out_dir: PathBuf,
    save_result_as_radiance: bool,
    debug: DebugOutputs,
}

impl PrecomputeOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        let mut out_dir = out_dir.into();
        // "out/" and "out" name the same tree.
        if let Some(trimmed) = out_dir.to_str().map(|s| s.trim_end_matches('/')) {
            if !trimmed.is_empty() {
                out_dir = PathBuf::from(trimmed);
            }
        }
        Self {
            out_dir,
            save_result_as_radiance: false,
            debug: DebugOutputs::empty(),
        }
    }

    pub fn with_radiance(mut self, radiance: bool) -> Self {
        self.save_result_as_radiance = radiance;
        self
    }

    pub fn with_debug(mut self, debug: DebugOutputs) -> Self {
        self.debug = debug;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn save_result_as_radiance(&self) -> bool {
        self.save_result_as_radiance
    }

    pub fn debug(&self, flag: DebugOutputs) -> bool {
        self.debug.contains(flag)
    }

    pub fn debug_outputs(&self) -> DebugOutputs {
        self.debug
    }
}
