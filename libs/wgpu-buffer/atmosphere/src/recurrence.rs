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

//! Scattering orders 2 and up.
//!
//! Only two 4D images are ever live for the recurrence: the delta image of
//! the order in flight and the accumulator. Order 2 is special because the
//! single scattering of every scatterer feeds its density one at a time,
//! with the phase function of that scatterer applied as it is read.
use crate::{
    bindings::Pass,
    console::Stage,
    context::{PassParameters, PipelineContext},
    order_one::save_irradiance,
    options::DebugOutputs,
    params::{AtmosphereParameters, PhaseFunctionType, Scatterer},
    persistence::{save_accumulator, save_image, scattering_dims},
    render_shaders,
    shader_source::{current_scatterer, SourceOverlay, Specialization, CURRENT_SCATTERER},
    textures::TextureRole,
};
use anyhow::Result;
use log::debug;

/// Whether accumulating the delta of `order` adds to what the multiple
/// scattering image holds. Luminance from every wavelength set lands in
/// the one image; radiance gets a fresh image per set.
pub fn accumulation_blends(order: u32, tex_index: usize, radiance: bool) -> bool {
    order > 2 || (tex_index > 0 && !radiance)
}

/// The first scatterer of order 2 replaces the delta irradiance left by
/// the direct pass; the rest add to it.
pub fn delta_irradiance_blends(scatterer_index: usize) -> bool {
    scatterer_index > 0
}

/// Switches of the order 2 density pass. The ground-only pass runs first
/// and overwrites; each scatterer then adds its share.
pub fn order2_density_switches(from_ground_only: bool) -> Specialization {
    Specialization::new()
        .scattering_order(2)
        .flag("RADIATION_IS_FROM_GROUND_ONLY", from_ground_only)
        .flag("BLEND_WITH_TARGET", !from_ground_only)
}

/// Switches of the order 2 indirect irradiance pass of one scatterer. The
/// accumulated image already holds the direct irradiance, so it always adds.
pub fn order2_indirect_irradiance_switches(scatterer_index: usize) -> Specialization {
    Specialization::new()
        .scattering_order(1)
        .flag("BLEND_DELTA_IRRADIANCE", delta_irradiance_blends(scatterer_index))
        .flag("BLEND_ACCUMULATED_IRRADIANCE", true)
}

/// Switches of the copy into a single scattering accumulator; a freshly
/// created one holds garbage and must be overwritten.
pub fn accumulator_copy_switches(created: bool) -> Specialization {
    Specialization::new()
        .flag("CONVERT_TO_LUMINANCE", true)
        .flag("BLEND_WITH_TARGET", !created)
}

/// Smooth single scattering goes into the multiple scattering image right
/// before that image is saved.
pub fn merges_smooth_scatterers(
    atmo: &AtmosphereParameters,
    order: u32,
    tex_index: usize,
    radiance: bool,
) -> bool {
    order == atmo.scattering_orders_to_compute
        && (atmo.is_last_wavelength_set(tex_index) || radiance)
}

fn scatterer_overlay(
    atmo: &AtmosphereParameters,
    base: &SourceOverlay,
    scatterer: &Scatterer,
    tex_index: usize,
) -> SourceOverlay {
    base.with(CURRENT_SCATTERER, current_scatterer(atmo, scatterer, tex_index))
}

/// Every order from 2 up to the configured count, for one wavelength set.
pub fn compute_multiple_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    {
        let _stage = Stage::begin("Working on scattering orders 1 and 2");
        compute_scattering_density_order2(ctx, base, tex_index)?;
        compute_multiple_scattering_from_density(ctx, base, 2, tex_index)?;
    }
    render_shaders::save_eclipsed_double_scattering_shaders(ctx, base, tex_index)?;
    let atmo = ctx.atmo();
    for order in 3..=atmo.scattering_orders_to_compute {
        let _stage = Stage::begin(&format!("Working on scattering order {}", order));
        compute_scattering_density(ctx, base, order, tex_index)?;
        compute_indirect_irradiance(ctx, base, order, tex_index)?;
        compute_multiple_scattering_from_density(ctx, base, order, tex_index)?;
    }
    Ok(())
}

fn compute_scattering_density_order2(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let params = PassParameters::for_wavelength_set(atmo, tex_index);

    // Light reflected by the ground needs no scatterer of its own; the stub
    // in the base overlay stands in.
    let pipeline = ctx.pipeline(
        Pass::ScatteringDensity,
        base,
        &order2_density_switches(true),
        "scattering density computation program",
    )?;
    {
        let _stage = Stage::begin("Computing scattering density layers for radiation from the ground");
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::ScatteringDensity,
            &pipeline,
            &[
                textures.view(TextureRole::Transmittance),
                textures.view(TextureRole::DeltaIrradiance),
                textures.view(TextureRole::DeltaScattering),
                textures.view(TextureRole::DeltaScatteringDensity),
            ],
            &params,
            "scattering density image",
        )?;
    }
    if ctx
        .options()
        .debug(DebugOutputs::SAVE_SCAT_DENSITY_ORDER2_FROM_GROUND)
    {
        save_image(
            ctx,
            TextureRole::DeltaScatteringDensity,
            "order 2 scattering density from ground texture",
            &format!("scattering-density2-from-ground-wlset{}.f32", tex_index),
            &scattering_dims(atmo),
        )?;
    }

    for (scatterer_index, scatterer) in atmo.scatterers.iter().enumerate() {
        let _stage = Stage::begin(&format!("Processing scatterer \"{}\"", scatterer.name));
        compute_single_scattering(ctx, base, tex_index, scatterer)?;
        render_shaders::save_single_scattering_shaders(ctx, base, tex_index, scatterer)?;

        let overlay = scatterer_overlay(atmo, base, scatterer, tex_index);
        let pipeline = ctx.pipeline(
            Pass::ScatteringDensity,
            &overlay,
            &order2_density_switches(false),
            "scattering density computation program",
        )?;
        {
            let _stage = Stage::begin("Computing scattering density layers");
            let textures = ctx.textures();
            ctx.dispatch_layers(
                Pass::ScatteringDensity,
                &pipeline,
                &[
                    textures.view(TextureRole::Transmittance),
                    textures.view(TextureRole::DeltaIrradiance),
                    textures.view(TextureRole::DeltaScattering),
                    textures.view(TextureRole::DeltaScatteringDensity),
                ],
                &params,
                "scattering density image",
            )?;
        }

        // The density above read the direct irradiance, so this must come
        // after it.
        let pipeline = ctx.pipeline(
            Pass::IndirectIrradiance,
            &overlay,
            &order2_indirect_irradiance_switches(scatterer_index),
            "indirect irradiance computation program",
        )?;
        dispatch_indirect_irradiance(ctx, &pipeline, &params)?;
    }
    save_irradiance(ctx, 2, tex_index)?;
    save_scattering_density(ctx, 2, tex_index)
}

fn compute_single_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
    scatterer: &Scatterer,
) -> Result<()> {
    let atmo = ctx.atmo();
    let overlay = scatterer_overlay(atmo, base, scatterer, tex_index);
    let pipeline = ctx.pipeline(
        Pass::SingleScattering,
        &overlay,
        &Specialization::new(),
        "single scattering computation program",
    )?;
    {
        let _stage = Stage::begin("Computing single scattering layers");
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::SingleScattering,
            &pipeline,
            &[
                textures.view(TextureRole::Transmittance),
                textures.view(TextureRole::DeltaScattering),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            "single scattering image",
        )?;
    }

    match scatterer.phase_function_type {
        PhaseFunctionType::General => save_image(
            ctx,
            TextureRole::DeltaScattering,
            "single scattering texture",
            &format!("single-scattering/{}/{}.f32", tex_index, scatterer.name),
            &scattering_dims(atmo),
        ),
        PhaseFunctionType::Achromatic | PhaseFunctionType::Smooth => {
            accumulate_single_scattering(ctx, base, tex_index, scatterer)
        }
    }
}

/// Sum the luminance of the scatterer's single scattering over the
/// wavelength sets.
fn accumulate_single_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
    scatterer: &Scatterer,
) -> Result<()> {
    let gpu = ctx.gpu();
    let atmo = ctx.atmo();
    let (_, created) = ctx.textures_mut().accumulator(gpu, atmo, &scatterer.name)?;
    let pipeline = ctx.pipeline(
        Pass::CopyScattering,
        base,
        &accumulator_copy_switches(created),
        "scattering texture copy-blend program",
    )?;
    {
        let _stage = Stage::begin("Blending single scattering layers into accumulator texture");
        let textures = ctx.textures();
        let accumulator = textures.existing_accumulator(&scatterer.name)?;
        ctx.dispatch_layers(
            Pass::CopyScattering,
            &pipeline,
            &[textures.view(TextureRole::DeltaScattering), accumulator.view()],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            accumulator.label(),
        )?;
    }

    if atmo.is_last_wavelength_set(tex_index)
        && scatterer.phase_function_type != PhaseFunctionType::Smooth
    {
        save_accumulator(
            ctx,
            &scatterer.name,
            &format!("single-scattering/{}-xyzw.f32", scatterer.name),
        )?;
    }
    Ok(())
}

fn compute_scattering_density(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    order: u32,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let pipeline = ctx.pipeline(
        Pass::ScatteringDensity,
        base,
        &Specialization::new().scattering_order(order),
        "scattering density computation program",
    )?;
    {
        let _stage = Stage::begin("Computing scattering density layers");
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::ScatteringDensity,
            &pipeline,
            &[
                textures.view(TextureRole::Transmittance),
                textures.view(TextureRole::DeltaIrradiance),
                textures.view(TextureRole::DeltaScattering),
                textures.view(TextureRole::DeltaScatteringDensity),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            "scattering density image",
        )?;
    }
    save_scattering_density(ctx, order, tex_index)
}

/// Irradiance from the scattered light of order `order - 1`. The delta
/// image of the previous order is replaced.
fn compute_indirect_irradiance(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    order: u32,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let pipeline = ctx.pipeline(
        Pass::IndirectIrradiance,
        base,
        &Specialization::new()
            .scattering_order(order - 1)
            .flag("BLEND_ACCUMULATED_IRRADIANCE", true),
        "indirect irradiance computation program",
    )?;
    dispatch_indirect_irradiance(
        ctx,
        &pipeline,
        &PassParameters::for_wavelength_set(atmo, tex_index),
    )?;
    save_irradiance(ctx, order, tex_index)
}

fn dispatch_indirect_irradiance(
    ctx: &PipelineContext,
    pipeline: &wgpu::ComputePipeline,
    params: &PassParameters,
) -> Result<()> {
    let _stage = Stage::begin("Computing indirect irradiance");
    let atmo = ctx.atmo();
    let textures = ctx.textures();
    ctx.dispatch_2d(
        Pass::IndirectIrradiance,
        pipeline,
        &[
            textures.view(TextureRole::Transmittance),
            textures.view(TextureRole::DeltaScattering),
            textures.view(TextureRole::DeltaIrradiance),
            textures.view(TextureRole::Irradiance),
        ],
        params,
        atmo.irradiance_tex_w,
        atmo.irradiance_tex_h,
        "irradiance images",
    )
}

fn save_scattering_density(ctx: &mut PipelineContext, order: u32, tex_index: usize) -> Result<()> {
    if !ctx.options().debug(DebugOutputs::SAVE_SCAT_DENSITY) {
        return Ok(());
    }
    let dims = scattering_dims(ctx.atmo());
    save_image(
        ctx,
        TextureRole::DeltaScatteringDensity,
        &format!("order {} scattering density", order),
        &format!("scattering-density{}-wlset{}.f32", order, tex_index),
        &dims,
    )
}

fn compute_multiple_scattering_from_density(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    order: u32,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let pipeline = ctx.pipeline(
        Pass::MultipleScattering,
        base,
        &Specialization::new(),
        "multiple scattering computation program",
    )?;
    {
        let _stage = Stage::begin("Computing multiple scattering layers");
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::MultipleScattering,
            &pipeline,
            &[
                textures.view(TextureRole::Transmittance),
                textures.view(TextureRole::DeltaScatteringDensity),
                textures.view(TextureRole::DeltaScattering),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            "delta scattering image",
        )?;
    }
    if ctx.options().debug(DebugOutputs::SAVE_DELTA_SCATTERING) {
        save_image(
            ctx,
            TextureRole::DeltaScattering,
            "delta scattering texture",
            &format!("delta-scattering-order{}-wlset{}.f32", order, tex_index),
            &scattering_dims(atmo),
        )?;
    }
    accumulate_multiple_scattering(ctx, base, order, tex_index)
}

fn accumulate_multiple_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    order: u32,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let radiance = ctx.options().save_result_as_radiance();
    let pipeline = ctx.pipeline(
        Pass::CopyScattering,
        base,
        &Specialization::new()
            .flag("CONVERT_TO_LUMINANCE", !radiance)
            .flag("BLEND_WITH_TARGET", accumulation_blends(order, tex_index, radiance)),
        "scattering texture copy-blend program",
    )?;
    {
        let _stage = Stage::begin("Blending multiple scattering layers into accumulator texture");
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::CopyScattering,
            &pipeline,
            &[
                textures.view(TextureRole::DeltaScattering),
                textures.view(TextureRole::MultipleScattering),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            "multiple scattering image",
        )?;
    }

    let dims = scattering_dims(atmo);
    if ctx.options().debug(DebugOutputs::SAVE_ACCUM_SCATTERING) {
        save_image(
            ctx,
            TextureRole::MultipleScattering,
            "multiple scattering accumulator texture",
            &format!("multiple-scattering-to-order{}-wlset{}.f32", order, tex_index),
            &dims,
        )?;
    }
    if merges_smooth_scatterers(atmo, order, tex_index, radiance) {
        merge_smooth_single_scattering(ctx, base, tex_index)?;
        let file_name = if radiance {
            format!("multiple-scattering-wlset{}.f32", tex_index)
        } else {
            "multiple-scattering-xyzw.f32".to_owned()
        };
        save_image(
            ctx,
            TextureRole::MultipleScattering,
            "multiple scattering accumulator texture",
            &file_name,
            &dims,
        )?;
    }
    Ok(())
}

fn merge_smooth_single_scattering(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    for scatterer in atmo
        .scatterers
        .iter()
        .filter(|s| s.phase_function_type == PhaseFunctionType::Smooth)
    {
        debug!("merging single scattering of {}", scatterer.name);
        let pipeline = ctx.pipeline(
            Pass::MergeSmoothSingleScattering,
            &scatterer_overlay(atmo, base, scatterer, tex_index),
            &Specialization::new(),
            "single scattering texture merge program",
        )?;
        let _stage = Stage::begin(&format!(
            "Blending single scattering data for scatterer \"{}\" into multiple scattering texture",
            scatterer.name
        ));
        let textures = ctx.textures();
        ctx.dispatch_layers(
            Pass::MergeSmoothSingleScattering,
            &pipeline,
            &[
                textures.existing_accumulator(&scatterer.name)?.view(),
                textures.view(TextureRole::MultipleScattering),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            "multiple scattering image",
        )?;
    }
    Ok(())
}
