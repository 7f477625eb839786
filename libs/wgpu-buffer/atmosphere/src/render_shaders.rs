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

//! Programs for the renderer. Each variant is compiled here so a broken one
//! fails the run, then its source units are written out verbatim.
use crate::{
    console,
    context::PipelineContext,
    params::{PhaseFunctionType, Scatterer},
    persistence::{save_shaders, ShaderDir, SingleScatteringMode},
    program::{compile, resolve, ProgramStage},
    shader_source::{current_scatterer, specialize, SourceOverlay, Specialization, CURRENT_SCATTERER},
};
use anyhow::Result;

const RENDER_ENTRY: &str = "render.frag";
const ECLIPSED_SINGLE_SCATTERING_ENTRY: &str = "compute-eclipsed-single-scattering.comp";

fn save_program(
    ctx: &PipelineContext,
    entry: &str,
    stage: ProgramStage,
    overlay: &SourceOverlay,
    spec: &Specialization,
    description: &str,
    dir: ShaderDir,
) -> Result<()> {
    let specialized = specialize(overlay, spec, entry)?;
    let program = resolve(entry, &specialized)?;
    let mut units = Vec::new();
    compile(ctx.gpu(), &program, description, stage, Some(&mut units))?;
    let out_dir = ctx.options().out_dir();
    console::note(&format!(
        "Saving {} to \"{}\"",
        description,
        dir.path(out_dir).display()
    ));
    save_shaders(out_dir, dir, &units)
}

fn save_render_program(
    ctx: &PipelineContext,
    overlay: &SourceOverlay,
    render_mode: &[&'static str],
    description: &str,
    dir: ShaderDir,
) -> Result<()> {
    save_program(
        ctx,
        RENDER_ENTRY,
        ProgramStage::Fragment,
        overlay,
        &Specialization::new().render_mode(render_mode),
        description,
        dir,
    )
}

/// Direct sunlight and light reflected once by the ground, with and
/// without the Moon in front of the Sun.
pub fn save_zero_order_shaders(
    ctx: &PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    save_render_program(
        ctx,
        base,
        &["RENDERING_ANY_ZERO_SCATTERING", "RENDERING_ZERO_SCATTERING"],
        "zero-order scattering rendering program",
        ShaderDir::ZeroOrder(tex_index),
    )?;
    save_render_program(
        ctx,
        base,
        &[
            "RENDERING_ANY_ZERO_SCATTERING",
            "RENDERING_ECLIPSED_ZERO_SCATTERING",
        ],
        "eclipsed zero-order scattering rendering program",
        ShaderDir::EclipsedZeroOrder(tex_index),
    )
}

fn single_scattering_mode_macro(
    eclipsed: bool,
    mode: SingleScatteringMode,
    phase_function_type: PhaseFunctionType,
) -> &'static str {
    let radiance = phase_function_type == PhaseFunctionType::General;
    match (eclipsed, mode, radiance) {
        (false, SingleScatteringMode::OnTheFly, _) => "RENDERING_SINGLE_SCATTERING_ON_THE_FLY",
        (false, SingleScatteringMode::Precomputed, true) => {
            "RENDERING_SINGLE_SCATTERING_PRECOMPUTED_RADIANCE"
        }
        (false, SingleScatteringMode::Precomputed, false) => {
            "RENDERING_SINGLE_SCATTERING_PRECOMPUTED_LUMINANCE"
        }
        (true, SingleScatteringMode::OnTheFly, _) => "RENDERING_ECLIPSED_SINGLE_SCATTERING_ON_THE_FLY",
        (true, SingleScatteringMode::Precomputed, true) => {
            "RENDERING_ECLIPSED_SINGLE_SCATTERING_PRECOMPUTED_RADIANCE"
        }
        (true, SingleScatteringMode::Precomputed, false) => {
            "RENDERING_ECLIPSED_SINGLE_SCATTERING_PRECOMPUTED_LUMINANCE"
        }
    }
}

/// Render variants of which single scattering a scatterer gets. Smooth
/// scatterers are already part of multiple scattering unless eclipsed.
pub fn single_scattering_variants(
    phase_function_type: PhaseFunctionType,
) -> Vec<(bool, SingleScatteringMode)> {
    let mut variants = Vec::new();
    for eclipsed in [false, true] {
        if !eclipsed && phase_function_type == PhaseFunctionType::Smooth {
            continue;
        }
        for mode in [SingleScatteringMode::OnTheFly, SingleScatteringMode::Precomputed] {
            variants.push((eclipsed, mode));
        }
    }
    variants
}

/// Every single scattering rendering program of `scatterer`, plus the
/// program the renderer runs to fill the eclipsed single scattering table.
pub fn save_single_scattering_shaders(
    ctx: &PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
    scatterer: &Scatterer,
) -> Result<()> {
    let atmo = ctx.atmo();
    let overlay = base.with(CURRENT_SCATTERER, current_scatterer(atmo, scatterer, tex_index));
    for (eclipsed, mode) in single_scattering_variants(scatterer.phase_function_type) {
        save_render_program(
            ctx,
            &overlay,
            &[
                "RENDERING_ANY_SINGLE_SCATTERING",
                single_scattering_mode_macro(eclipsed, mode, scatterer.phase_function_type),
            ],
            "single scattering rendering program",
            ShaderDir::SingleScattering {
                eclipsed,
                mode,
                tex_index,
                scatterer,
            },
        )?;
    }

    let output = if scatterer.phase_function_type == PhaseFunctionType::General {
        "COMPUTE_RADIANCE"
    } else {
        "COMPUTE_LUMINANCE"
    };
    save_program(
        ctx,
        ECLIPSED_SINGLE_SCATTERING_ENTRY,
        ProgramStage::Compute,
        &overlay,
        &Specialization::new().flag(output, true),
        "eclipsed single scattering computation program",
        ShaderDir::EclipsedSingleScatteringPrecomputation(tex_index, &scatterer.name),
    )
}

pub fn save_eclipsed_double_scattering_shaders(
    ctx: &PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    save_render_program(
        ctx,
        base,
        &["RENDERING_ECLIPSED_DOUBLE_SCATTERING_PRECOMPUTED_RADIANCE"],
        "double scattering rendering program",
        ShaderDir::EclipsedDoubleScatteringPrecomputed(tex_index),
    )
}

/// With radiance output there is one program per wavelength set; else a
/// single one that reads the luminance table.
pub fn save_multiple_scattering_shaders(
    ctx: &PipelineContext,
    base: &SourceOverlay,
    tex_index: Option<usize>,
) -> Result<()> {
    let render_mode = match tex_index {
        Some(_) => "RENDERING_MULTIPLE_SCATTERING_RADIANCE",
        None => "RENDERING_MULTIPLE_SCATTERING_LUMINANCE",
    };
    save_render_program(
        ctx,
        base,
        &[render_mode],
        "multiple scattering rendering program",
        ShaderDir::MultipleScattering(tex_index),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        parser::{parse_description, test::EARTH},
        shader_source::base_overlay,
    };

    #[test]
    fn test_smooth_skips_uneclipsed_variants() {
        assert_eq!(single_scattering_variants(PhaseFunctionType::General).len(), 4);
        assert_eq!(single_scattering_variants(PhaseFunctionType::Achromatic).len(), 4);
        let smooth = single_scattering_variants(PhaseFunctionType::Smooth);
        assert_eq!(smooth.len(), 2);
        assert!(smooth.iter().all(|(eclipsed, _)| *eclipsed));
    }

    #[test]
    fn test_mode_macro_follows_phase_function() {
        use SingleScatteringMode::*;
        assert_eq!(
            single_scattering_mode_macro(false, Precomputed, PhaseFunctionType::General),
            "RENDERING_SINGLE_SCATTERING_PRECOMPUTED_RADIANCE"
        );
        assert_eq!(
            single_scattering_mode_macro(true, Precomputed, PhaseFunctionType::Achromatic),
            "RENDERING_ECLIPSED_SINGLE_SCATTERING_PRECOMPUTED_LUMINANCE"
        );
        assert_eq!(
            single_scattering_mode_macro(true, OnTheFly, PhaseFunctionType::Smooth),
            "RENDERING_ECLIPSED_SINGLE_SCATTERING_ON_THE_FLY"
        );
    }

    #[test]
    fn test_render_program_sets_one_mode() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let base = base_overlay(&atmo, 0)?;
        let spec = Specialization::new().render_mode(&["RENDERING_MULTIPLE_SCATTERING_LUMINANCE"]);
        let specialized = specialize(&base, &spec, RENDER_ENTRY)?;
        let program = resolve(RENDER_ENTRY, &specialized)?;
        assert!(program.source.contains("#elif 1\n    fragLuminance=sample4DTexture"));
        assert!(!program.source.contains("#elif RENDERING_MULTIPLE_SCATTERING_LUMINANCE"));
        // The view direction stub is never written out.
        let mut units = Vec::new();
        crate::program::capture_units(&program, &mut units);
        assert!(units.iter().all(|(name, _)| name != "calc-view-dir.frag"));
        assert!(units.iter().any(|(name, _)| name == RENDER_ENTRY));
        Ok(())
    }
}
