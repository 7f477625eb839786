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
use crate::{
    console::{self, format_elapsed, Stage},
    context::PipelineContext,
    eclipse::compute_eclipsed_double_scattering,
    options::{DebugOutputs, PrecomputeOptions},
    order_one::{compute_direct_irradiance, compute_transmittance},
    params::AtmosphereParameters,
    persistence::{create_output_directories, write_params_manifest},
    recurrence::compute_multiple_scattering,
    render_shaders,
    shader_source::base_overlay,
};
use anyhow::Result;
use gpu::Gpu;
use log::info;
use std::time::Instant;

/// One run of the precomputation: every table and renderer program for
/// one atmosphere description, written under the output directory.
pub struct Precompute {
    atmo: AtmosphereParameters,
    options: PrecomputeOptions,
}

impl Precompute {
    /// Directives in the description and options on the command line mean
    /// the same thing; either one turns the behavior on.
    pub fn new(mut atmo: AtmosphereParameters, mut options: PrecomputeOptions) -> Self {
        if atmo.all_textures_are_radiance {
            options = options.with_radiance(true);
        }
        if atmo.no_eclipsed_double_scattering_textures {
            let debug = options.debug_outputs() | DebugOutputs::NO_EDS_TEXTURES;
            options = options.with_debug(debug);
        }
        if options.save_result_as_radiance() {
            atmo.force_radiance_output();
        }
        Self { atmo, options }
    }

    pub fn atmosphere(&self) -> &AtmosphereParameters {
        &self.atmo
    }

    pub fn options(&self) -> &PrecomputeOptions {
        &self.options
    }

    pub fn run(&self, gpu: &Gpu) -> Result<()> {
        let start = Instant::now();
        let atmo = &self.atmo;
        let radiance = self.options.save_result_as_radiance();

        create_output_directories(atmo, &self.options)?;
        write_params_manifest(atmo, &self.options)?;

        let mut ctx = PipelineContext::new(gpu, atmo, &self.options)?;
        let mut last_base = None;
        let set_count = atmo.wavelength_set_count();
        for (tex_index, wavelengths) in atmo.all_wavelengths.iter().enumerate() {
            let _stage = Stage::begin(&format!(
                "Working on wavelengths {}, {}, {}, {} nm (set {} of {})",
                wavelengths[0],
                wavelengths[1],
                wavelengths[2],
                wavelengths[3],
                tex_index + 1,
                set_count
            ));
            let base = base_overlay(atmo, tex_index)?;
            render_shaders::save_zero_order_shaders(&ctx, &base, tex_index)?;
            {
                let _stage = Stage::begin("Computing parts of scattering order 1");
                compute_transmittance(&mut ctx, &base, tex_index)?;
                compute_direct_irradiance(&mut ctx, &base, tex_index)?;
            }
            compute_multiple_scattering(&mut ctx, &base, tex_index)?;
            if radiance {
                render_shaders::save_multiple_scattering_shaders(&ctx, &base, Some(tex_index))?;
            }
            compute_eclipsed_double_scattering(&mut ctx, &base, tex_index)?;
            last_base = Some(base);
        }
        if !radiance {
            if let Some(base) = &last_base {
                render_shaders::save_multiple_scattering_shaders(&ctx, base, None)?;
            }
        }

        console::note(&format!("Finished in {}", format_elapsed(start.elapsed())));
        info!(
            "compiled {} compute programs for {} wavelength sets",
            ctx.compilations(),
            set_count
        );
        Ok(())
    }
}
