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
use anyhow::{bail, Error, Result};
use std::str::FromStr;
use structopt::StructOpt;

/// Which class of adapter to ask the platform for. Precomputation is
/// long-running and compute bound, so the default is the fastest device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterPreference {
    HighPerformance,
    LowPower,
    Fallback,
}

impl Default for AdapterPreference {
    fn default() -> Self {
        Self::HighPerformance
    }
}

impl AdapterPreference {
    pub(crate) fn power_preference(&self) -> wgpu::PowerPreference {
        match self {
            Self::HighPerformance => wgpu::PowerPreference::HighPerformance,
            Self::LowPower | Self::Fallback => wgpu::PowerPreference::LowPower,
        }
    }

    pub(crate) fn force_fallback_adapter(&self) -> bool {
        *self == Self::Fallback
    }
}

impl FromStr for AdapterPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "high" | "hi" | "discrete" => Self::HighPerformance,
            "low" | "lo" | "integrated" => Self::LowPower,
            "fallback" | "software" => Self::Fallback,
            _ => bail!("unrecognized adapter preference; expected high, low, or fallback"),
        })
    }
}

#[derive(Clone, Debug, Default, StructOpt)]
pub struct GpuOpts {
    /// Select the graphics adapter (high, low, or fallback)
    #[structopt(long)]
    adapter: Option<AdapterPreference>,

    /// Record a wgpu API trace into this directory
    #[structopt(long)]
    api_trace: Option<std::path::PathBuf>,
}

impl GpuOpts {
    pub fn adapter(&self) -> AdapterPreference {
        self.adapter.unwrap_or_default()
    }

    pub fn api_trace(&self) -> Option<&std::path::Path> {
        self.api_trace.as_deref()
    }

    pub fn with_adapter(mut self, adapter: AdapterPreference) -> Self {
        self.adapter = Some(adapter);
        self
    }
}
