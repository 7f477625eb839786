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
use crate::{bindings::TEXTURE_FORMAT, error::Error, params::AtmosphereParameters};
use anyhow::Result;
use fxhash::FxHashMap;
use gpu::Gpu;
use log::{debug, info};

const TEXEL_COMPONENTS: usize = 4;

/// The working set of images shared by every pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextureRole {
    Transmittance,
    DeltaIrradiance,
    Irradiance,
    DeltaScattering,
    DeltaScatteringDensity,
    MultipleScattering,
    EclipsedDoubleScattering,
}

impl TextureRole {
    const ALL: [TextureRole; 7] = [
        TextureRole::Transmittance,
        TextureRole::DeltaIrradiance,
        TextureRole::Irradiance,
        TextureRole::DeltaScattering,
        TextureRole::DeltaScatteringDensity,
        TextureRole::MultipleScattering,
        TextureRole::EclipsedDoubleScattering,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Transmittance => "atmosphere-transmittance-texture",
            Self::DeltaIrradiance => "atmosphere-delta-irradiance-texture",
            Self::Irradiance => "atmosphere-irradiance-texture",
            Self::DeltaScattering => "atmosphere-delta-scattering-texture",
            Self::DeltaScatteringDensity => "atmosphere-delta-scattering-density-texture",
            Self::MultipleScattering => "atmosphere-multiple-scattering-texture",
            Self::EclipsedDoubleScattering => "atmosphere-eclipsed-double-scattering-texture",
        }
    }

    fn extent(self, atmo: &AtmosphereParameters) -> (wgpu::Extent3d, wgpu::TextureDimension) {
        let d2 = |width, height| {
            (
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                wgpu::TextureDimension::D2,
            )
        };
        match self {
            Self::Transmittance => d2(atmo.transmittance_tex_w, atmo.transmittance_tex_h),
            Self::DeltaIrradiance | Self::Irradiance => {
                d2(atmo.irradiance_tex_w, atmo.irradiance_tex_h)
            }
            Self::DeltaScattering | Self::DeltaScatteringDensity | Self::MultipleScattering => {
                (scattering_extent(atmo), wgpu::TextureDimension::D3)
            }
            Self::EclipsedDoubleScattering => d2(
                atmo.eclipsed_double_scattering_texture_size[0],
                atmo.eclipsed_double_scattering_texture_size[1],
            ),
        }
    }
}

/// The 4D scattering table packed into 3D: the dot(view,sun) and SZA axes
/// share the height.
pub fn scattering_extent(atmo: &AtmosphereParameters) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: atmo.scat_tex_width(),
        height: atmo.scat_tex_height(),
        depth_or_array_layers: atmo.scat_tex_depth(),
    }
}

pub fn texel_count(extent: wgpu::Extent3d) -> usize {
    extent.width as usize * extent.height as usize * extent.depth_or_array_layers as usize
}

pub struct Texture {
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: wgpu::Extent3d,
}

impl Texture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        extent: wgpu::Extent3d,
        dimension: wgpu::TextureDimension,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{}-view", label)),
            format: None,
            dimension: None,
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        });
        Self {
            label: label.to_owned(),
            texture,
            view,
            extent,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        self.extent
    }
}

fn check_limits(gpu: &Gpu, atmo: &AtmosphereParameters) -> Result<()> {
    let limits = gpu.limits();
    for role in TextureRole::ALL {
        let (extent, dimension) = role.extent(atmo);
        let max = match dimension {
            wgpu::TextureDimension::D3 => limits.max_texture_dimension_3d,
            _ => limits.max_texture_dimension_2d,
        };
        let largest = extent
            .width
            .max(extent.height)
            .max(extent.depth_or_array_layers);
        if largest > max {
            return Err(Error::Gpu(format!(
                "{} of {}x{}x{} exceeds the device limit of {} texels per side",
                role.label(),
                extent.width,
                extent.height,
                extent.depth_or_array_layers,
                max
            ))
            .into());
        }
    }
    Ok(())
}

/// Every image the pipeline writes, allocated up front so that running out
/// of memory happens before any work is done.
pub struct TextureSet {
    fixed: Vec<Texture>,
    accumulators: FxHashMap<String, Texture>,
    readback: wgpu::Buffer,
    staging: Vec<f32>,
}

impl TextureSet {
    pub fn new(gpu: &Gpu, atmo: &AtmosphereParameters) -> Result<Self> {
        check_limits(gpu, atmo)?;
        let fixed = gpu
            .scoped(
                wgpu::ErrorFilter::OutOfMemory,
                "failed to allocate the precomputation textures",
                |device| {
                    TextureRole::ALL
                        .iter()
                        .map(|role| {
                            let (extent, dimension) = role.extent(atmo);
                            Texture::new(device, role.label(), extent, dimension)
                        })
                        .collect::<Vec<_>>()
                },
            )
            .map_err(Error::gpu)?;

        let readback_size = fixed
            .iter()
            .map(|t| Gpu::readback_size(t.extent, TEXTURE_FORMAT))
            .max()
            .unwrap_or(0);
        let readback = gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("atmosphere-readback-buffer"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let largest = fixed.iter().map(|t| texel_count(t.extent)).max().unwrap_or(0);
        info!(
            "allocated {} textures; readback buffer is {} bytes",
            fixed.len(),
            readback_size
        );
        Ok(Self {
            fixed,
            accumulators: FxHashMap::default(),
            readback,
            staging: vec![0f32; largest * TEXEL_COMPONENTS],
        })
    }

    pub fn get(&self, role: TextureRole) -> &Texture {
        &self.fixed[role as usize]
    }

    pub fn view(&self, role: TextureRole) -> &wgpu::TextureView {
        self.get(role).view()
    }

    /// Single scattering accumulator of `name`, made on first use. The
    /// flag says whether it was made by this call and so holds no data.
    pub fn accumulator(
        &mut self,
        gpu: &Gpu,
        atmo: &AtmosphereParameters,
        name: &str,
    ) -> Result<(&Texture, bool)> {
        let created = !self.accumulators.contains_key(name);
        if created {
            let label = format!("atmosphere-single-scattering-accumulator-{}", name);
            debug!("creating {}", label);
            let texture = gpu
                .scoped(
                    wgpu::ErrorFilter::OutOfMemory,
                    &format!("failed to allocate {}", label),
                    |device| {
                        Texture::new(
                            device,
                            &label,
                            scattering_extent(atmo),
                            wgpu::TextureDimension::D3,
                        )
                    },
                )
                .map_err(Error::gpu)?;
            self.accumulators.insert(name.to_owned(), texture);
        }
        let texture = self.existing_accumulator(name)?;
        Ok((texture, created))
    }

    pub fn existing_accumulator(&self, name: &str) -> Result<&Texture> {
        self.accumulators.get(name).ok_or_else(|| {
            Error::Resource(format!("no single scattering accumulator for {}", name)).into()
        })
    }

    /// Download a fixed texture into the staging buffer and return its
    /// texels, row padding removed.
    pub fn read_back(&mut self, gpu: &Gpu, role: TextureRole) -> Result<&[f32]> {
        let texture = &self.fixed[role as usize];
        Self::read_into(gpu, texture, &self.readback, &mut self.staging)
    }

    pub fn read_back_accumulator(&mut self, gpu: &Gpu, name: &str) -> Result<&[f32]> {
        let texture = self.accumulators.get(name).ok_or_else(|| {
            Error::Resource(format!("no single scattering accumulator for {}", name))
        })?;
        Self::read_into(gpu, texture, &self.readback, &mut self.staging)
    }

    fn read_into<'a>(
        gpu: &Gpu,
        texture: &Texture,
        readback: &wgpu::Buffer,
        staging: &'a mut [f32],
    ) -> Result<&'a [f32]> {
        let len = texel_count(texture.extent) * TEXEL_COMPONENTS;
        let out = &mut staging[..len];
        gpu.read_texture(&texture.texture, texture.extent, TEXTURE_FORMAT, readback, out)
            .map_err(|e| Error::gpu(e.context(format!("reading back {}", texture.label))))?;
        Ok(out)
    }
}
