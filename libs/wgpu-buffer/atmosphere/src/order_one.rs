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
    console::Stage,
    context::{PassParameters, PipelineContext},
    options::DebugOutputs,
    persistence::{irradiance_dims, save_image, transmittance_dims},
    shader_source::{SourceOverlay, Specialization},
    textures::TextureRole,
};
use anyhow::Result;

/// Transmittance to the top of the atmosphere over (VZA, altitude).
pub fn compute_transmittance(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let pipeline = ctx.pipeline(
        Pass::Transmittance,
        base,
        &Specialization::new(),
        "transmittance computation program",
    )?;
    {
        let _stage = Stage::begin("Computing transmittance");
        let textures = ctx.textures();
        ctx.dispatch_2d(
            Pass::Transmittance,
            &pipeline,
            &[textures.view(TextureRole::Transmittance)],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            atmo.transmittance_tex_w,
            atmo.transmittance_tex_h,
            "transmittance image",
        )?;
    }
    save_image(
        ctx,
        TextureRole::Transmittance,
        "transmittance texture",
        &format!("transmittance-wlset{}.f32", tex_index),
        &transmittance_dims(atmo),
    )
}

/// Sunlight reaching the ground through the atmosphere. Seeds both the
/// delta and the accumulated irradiance.
pub fn compute_direct_irradiance(
    ctx: &mut PipelineContext,
    base: &SourceOverlay,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let pipeline = ctx.pipeline(
        Pass::DirectIrradiance,
        base,
        &Specialization::new(),
        "direct ground irradiance computation program",
    )?;
    {
        let _stage = Stage::begin("Computing direct ground irradiance");
        let textures = ctx.textures();
        ctx.dispatch_2d(
            Pass::DirectIrradiance,
            &pipeline,
            &[
                textures.view(TextureRole::Transmittance),
                textures.view(TextureRole::DeltaIrradiance),
                textures.view(TextureRole::Irradiance),
            ],
            &PassParameters::for_wavelength_set(atmo, tex_index),
            atmo.irradiance_tex_w,
            atmo.irradiance_tex_h,
            "irradiance images",
        )?;
    }
    save_irradiance(ctx, 1, tex_index)
}

/// Save ground irradiance after the pass that completes `scattering_order`.
/// The accumulated image is only a product once the last order is in.
pub fn save_irradiance(
    ctx: &mut PipelineContext,
    scattering_order: u32,
    tex_index: usize,
) -> Result<()> {
    let atmo = ctx.atmo();
    let dims = irradiance_dims(atmo);
    if scattering_order == atmo.scattering_orders_to_compute {
        save_image(
            ctx,
            TextureRole::Irradiance,
            "irradiance texture",
            &format!("irradiance-wlset{}.f32", tex_index),
            &dims,
        )?;
    }
    if !ctx.options().debug(DebugOutputs::SAVE_GROUND_IRRADIANCE) {
        return Ok(());
    }
    save_image(
        ctx,
        TextureRole::DeltaIrradiance,
        "delta irradiance texture",
        &format!(
            "irradiance-delta-order{}-wlset{}.f32",
            scattering_order - 1,
            tex_index
        ),
        &dims,
    )?;
    save_image(
        ctx,
        TextureRole::Irradiance,
        "accumulated irradiance texture",
        &format!(
            "irradiance-accum-order{}-wlset{}.f32",
            scattering_order - 1,
            tex_index
        ),
        &dims,
    )
}
