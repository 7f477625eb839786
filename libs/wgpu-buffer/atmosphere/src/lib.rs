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

// The scattering recurrence follows the structure of the most excellent:
//     https://ebruneton.github.io/precomputed_atmospheric_scattering/
// Which is:
//     Copyright (c) 2017 Eric Bruneton
// extended to any number of scatterers and absorbers, arbitrary wavelength
// sets, and the Moon passing in front of the Sun.
mod bindings;
mod colorspace;
mod console;
mod context;
mod eclipse;
mod error;
mod geometry;
mod options;
mod order_one;
mod params;
mod parser;
mod persistence;
mod precompute;
mod program;
mod recurrence;
mod render_shaders;
mod shader_source;
mod textures;

pub use crate::{
    bindings::REQUIRED_FEATURES,
    error::{exit_code_for, Error},
    options::{DebugOutputs, PrecomputeOptions},
    params::{
        Absorber, AtmosphereParameters, PhaseFunctionType, Scatterer,
        ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE, NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE,
    },
    parser::{parse_description, parse_description_file},
    persistence::{load_texture, save_texture},
    precompute::Precompute,
};
