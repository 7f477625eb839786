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
    bindings::Pass,
    console::{self, format_elapsed, Counter, Stage},
    context::{PassParameters, PipelineContext},
    geometry::{eclipse_camera_altitude, unit_range_coord, unit_range_tex_coord_to_cos_sza},
    options::DebugOutputs,
    persistence::{save_shaders, save_texture, ShaderDir},
    shader_source::{total_scattering_coefficient_statement, SourceOverlay, Specialization},
    textures::TextureRole,
};
use anyhow::Result;

const TEXEL_COMPONENTS: usize = 4;

/// First texel of the (azimuth, elevation) slice for one SZA and altitude
/// sample. Azimuth varies fastest, altitude slowest.
pub fn cell_offset(size: [u32; 4], sza_index: u32, alt_index: u32) -> usize {
    let [n_az, n_el, n_sza, _] = size.map(|v| v as usize);
    ((alt_index as usize * n_sza + sza_index as usize) * n_el) * n_az
}

/// Double scattering with the Moon in the way, for the Moon right at the
/// Sun. The renderer rotates the table to the actual Moon position.
pub fn compute_eclipsed_double_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let spec = Specialization::new()
        .flag("ALL_SCATTERERS_AT_ONCE_WITH_PHASE_FUNCTION", true)
        .total_scattering_coefficient(total_scattering_coefficient_statement(atmo));
    let mut units = Vec::new();
    let pipeline = ctx.pipeline_captured(
        Pass::EclipsedDoubleScattering,
        base,
        &spec,
        "eclipsed double scattering computation program",
        &mut units,
    )?;
    save_shaders(
        ctx.options().out_dir(),
        ShaderDir::EclipsedDoubleScatteringPrecomputation(tex_index),
        &units,
    )?;
    if ctx.options().debug(DebugOutputs::NO_EDS_TEXTURES) {
        return Ok(());
    }

    let size = atmo.eclipsed_double_scattering_texture_size;
    let [n_az, n_el, n_sza, n_alt] = size;
    let cell_len = n_az as usize * n_el as usize * TEXEL_COMPONENTS;
    let mut table = vec![0f32; cell_len * n_sza as usize * n_alt as usize];
    let params = PassParameters::for_wavelength_set(atmo, tex_index);
    {
        let stage = Stage::begin("Computing eclipsed double scattering");
        let mut counter = Counter::new("samples", (n_sza * n_alt) as usize);
        for sza_index in 0..n_sza {
            let cos_sza = unit_range_tex_coord_to_cos_sza(atmo, unit_range_coord(sza_index, n_sza));
            let sza = cos_sza.acos();
            for alt_index in 0..n_alt {
                counter.update((sza_index * n_alt + alt_index) as usize);
                let altitude = eclipse_camera_altitude(atmo, alt_index, n_alt);
                {
                    let textures = ctx.textures();
                    ctx.dispatch_2d(
                        Pass::EclipsedDoubleScattering,
                        &pipeline,
                        &[
                            textures.view(TextureRole::Transmittance),
                            textures.view(TextureRole::EclipsedDoubleScattering),
                        ],
                        &params.with_eclipse(altitude, sza, sza, 0.),
                        n_az,
                        n_el,
                        "eclipsed double scattering image",
                    )?;
                }
                let gpu = ctx.gpu();
                let cell = ctx
                    .textures_mut()
                    .read_back(gpu, TextureRole::EclipsedDoubleScattering)?;
                let start = cell_offset(size, sza_index, alt_index) * TEXEL_COMPONENTS;
                table[start..start + cell_len].copy_from_slice(cell);
            }
        }
        counter.update((n_sza * n_alt) as usize);
        counter.finish();
        console::note(&format!("done in {}", format_elapsed(stage.elapsed())));
    }

    let path = ctx
        .options()
        .out_dir()
        .join(format!("eclipsed-double-scattering-wlset{}.f32", tex_index));
    console::note(&format!(
        "Saving eclipsed double scattering texture to \"{}\"",
        path.display()
    ));
    save_texture(&path, &size, &table)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cells_tile_the_table() {
        let size = [16, 8, 4, 3];
        let cell = 16 * 8;
        assert_eq!(cell_offset(size, 0, 0), 0);
        assert_eq!(cell_offset(size, 1, 0), cell);
        assert_eq!(cell_offset(size, 3, 0), 3 * cell);
        assert_eq!(cell_offset(size, 0, 1), 4 * cell);
        assert_eq!(cell_offset(size, 3, 2) + cell, 16 * 8 * 4 * 3);
    }
}
