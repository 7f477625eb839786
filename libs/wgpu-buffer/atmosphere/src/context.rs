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
    bindings::{workgroups, Pass, PassLayouts},
    colorspace::{matrix_to_std140, radiance_to_luminance},
    console::Counter,
    error::Error,
    options::{DebugOutputs, PrecomputeOptions},
    params::AtmosphereParameters,
    program::{capture_units, compile, resolve, ProgramCache, ProgramStage, SourceUnit},
    shader_source::{specialize, SourceOverlay, Specialization},
    textures::TextureSet,
};
use anyhow::Result;
use gpu::Gpu;
use log::{debug, trace};
use static_assertions::const_assert_eq;
use std::{mem, rc::Rc};
use zerocopy::{AsBytes, FromBytes};

// Must match pass-parameters.glsl, std140.
#[repr(C)]
#[derive(AsBytes, FromBytes, Copy, Clone, Debug, Default)]
pub struct PassParameters {
    luminance_conversion: [[f32; 4]; 4],
    layer: i32,
    camera_altitude: f32,
    sun_zenith_angle: f32,
    moon_zenith_angle: f32,
    moon_azimuth: f32,
    _pad: [f32; 3],
}
const_assert_eq!(mem::size_of::<PassParameters>(), 96);

impl PassParameters {
    /// Parameters of a pass over wavelength set `tex_index`.
    pub fn for_wavelength_set(atmo: &AtmosphereParameters, tex_index: usize) -> Self {
        Self {
            luminance_conversion: matrix_to_std140(&radiance_to_luminance(atmo, tex_index)),
            ..Default::default()
        }
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer as i32;
        self
    }

    /// Camera, Sun and Moon of one eclipsed double scattering cell. Angles
    /// are radians.
    pub fn with_eclipse(
        mut self,
        camera_altitude: f64,
        sun_zenith_angle: f64,
        moon_zenith_angle: f64,
        moon_azimuth: f64,
    ) -> Self {
        self.camera_altitude = camera_altitude as f32;
        self.sun_zenith_angle = sun_zenith_angle as f32;
        self.moon_zenith_angle = moon_zenith_angle as f32;
        self.moon_azimuth = moon_azimuth as f32;
        self
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }
}

/// Everything the stages share: the device, the images, the compiled
/// programs and the one uniform buffer every pass reads its parameters from.
pub struct PipelineContext<'a> {
    gpu: &'a Gpu,
    atmo: &'a AtmosphereParameters,
    options: &'a PrecomputeOptions,
    textures: TextureSet,
    layouts: PassLayouts,
    pipelines: ProgramCache<Rc<wgpu::ComputePipeline>>,
    params_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        gpu: &'a Gpu,
        atmo: &'a AtmosphereParameters,
        options: &'a PrecomputeOptions,
    ) -> Result<Self> {
        let textures = TextureSet::new(gpu, atmo)?;
        let layouts = PassLayouts::new(gpu.device());
        let params_buffer = gpu.push_data(
            "atmosphere-pass-parameters",
            &PassParameters::default(),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atmosphere-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0f32,
            lod_max_clamp: 0f32,
            compare: None,
            anisotropy_clamp: None,
            border_color: None,
        });
        Ok(Self {
            gpu,
            atmo,
            options,
            textures,
            layouts,
            pipelines: ProgramCache::default(),
            params_buffer,
            sampler,
        })
    }

    pub fn gpu(&self) -> &'a Gpu {
        self.gpu
    }

    pub fn atmo(&self) -> &'a AtmosphereParameters {
        self.atmo
    }

    pub fn options(&self) -> &'a PrecomputeOptions {
        self.options
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureSet {
        &mut self.textures
    }

    pub fn compilations(&self) -> usize {
        self.pipelines.compilations()
    }

    /// Specialize, resolve and compile the program of `pass`, reusing an
    /// earlier compile of the identical source.
    pub fn pipeline(
        &mut self,
        pass: Pass,
        overlay: &SourceOverlay,
        spec: &Specialization,
        description: &str,
    ) -> Result<Rc<wgpu::ComputePipeline>> {
        self.build_pipeline(pass, overlay, spec, description, None)
    }

    /// As `pipeline`, also recording the source units of the program.
    pub fn pipeline_captured(
        &mut self,
        pass: Pass,
        overlay: &SourceOverlay,
        spec: &Specialization,
        description: &str,
        capture: &mut Vec<SourceUnit>,
    ) -> Result<Rc<wgpu::ComputePipeline>> {
        self.build_pipeline(pass, overlay, spec, description, Some(capture))
    }

    fn build_pipeline(
        &mut self,
        pass: Pass,
        overlay: &SourceOverlay,
        spec: &Specialization,
        description: &str,
        capture: Option<&mut Vec<SourceUnit>>,
    ) -> Result<Rc<wgpu::ComputePipeline>> {
        let specialized = specialize(overlay, spec, pass.entry())?;
        let program = resolve(pass.entry(), &specialized)?;
        if let Some(capture) = capture {
            capture_units(&program, capture);
        }
        let gpu = self.gpu;
        let layouts = &self.layouts;
        let pipeline = self.pipelines.get_or_compile(&program, |program| {
            let module = compile(gpu, program, description, ProgramStage::Compute, None)?;
            let pipeline = gpu
                .scoped(
                    wgpu::ErrorFilter::Validation,
                    &format!("failed to link {} ({})", program.name, description),
                    |device| layouts.create_pipeline(device, pass, &module),
                )
                .map_err(Error::gpu)?;
            Ok(Rc::new(pipeline))
        })?;
        Ok(pipeline.clone())
    }

    /// Run `pipeline` once over a `width` x `height` image. The views are
    /// bound from binding 2 on, in order.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch_2d(
        &self,
        pass: Pass,
        pipeline: &wgpu::ComputePipeline,
        views: &[&wgpu::TextureView],
        params: &PassParameters,
        width: u32,
        height: u32,
        target: &str,
    ) -> Result<()> {
        trace!("dispatching {} over {}x{} layer {}", pass.label(), width, height, params.layer);
        self.gpu.write_data(&self.params_buffer, params);
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: self.params_buffer.as_entire_binding(),
        }];
        if pass.uses_sampler() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        for (i, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let encoder = self
            .gpu
            .scoped(
                wgpu::ErrorFilter::Validation,
                &format!("{} is incomplete", target),
                |device| {
                    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("{}-bind-group", pass.label())),
                        layout: self.layouts.get(pass),
                        entries: &entries,
                    });
                    let mut encoder =
                        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some(&format!("{}-command-encoder", pass.label())),
                        });
                    {
                        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                            label: Some(&format!("{}-compute-pass", pass.label())),
                        });
                        cpass.set_pipeline(pipeline);
                        cpass.set_bind_group(0, &bind_group, &[]);
                        cpass.dispatch_workgroups(workgroups(width), workgroups(height), 1);
                    }
                    encoder
                },
            )
            .map_err(Error::gpu)?;
        self.gpu.submit_and_wait(encoder);
        Ok(())
    }

    /// Run `pipeline` once per layer of the 3D scattering images, waiting
    /// for the device after each one.
    pub fn dispatch_layers(
        &self,
        pass: Pass,
        pipeline: &wgpu::ComputePipeline,
        views: &[&wgpu::TextureView],
        params: &PassParameters,
        target: &str,
    ) -> Result<()> {
        if self.options.debug(DebugOutputs::NO_SAVE_TEXTURES) {
            debug!("skipping {}: textures are not saved", target);
            return Ok(());
        }
        let width = self.atmo.scat_tex_width();
        let height = self.atmo.scat_tex_height();
        let depth = self.atmo.scat_tex_depth();
        let mut counter = Counter::new("layers", depth as usize);
        for layer in 0..depth {
            counter.update(layer as usize);
            self.dispatch_2d(
                pass,
                pipeline,
                views,
                &params.with_layer(layer),
                width,
                height,
                target,
            )?;
        }
        counter.update(depth as usize);
        counter.finish();
        Ok(())
    }
}
