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
use crate::context::PassParameters;
use std::{mem, num::NonZeroU64};

// Note: must match the block size defined in compute shader source
pub const BLOCK_SIZE: u32 = 8;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

// Read-write storage and linear filtering of rgba32f are both adapter specific.
pub const REQUIRED_FEATURES: wgpu::Features =
    wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

fn uniform(binding: u32, min_binding_size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_binding_size as u64),
        },
        count: None,
    }
}

fn storage_texture(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            view_dimension,
            format: TEXTURE_FORMAT,
            access: wgpu::StorageTextureAccess::ReadWrite,
        },
        count: None,
    }
}

fn storage_texture2d(binding: u32) -> wgpu::BindGroupLayoutEntry {
    storage_texture(binding, wgpu::TextureViewDimension::D2)
}

fn storage_texture3d(binding: u32) -> wgpu::BindGroupLayoutEntry {
    storage_texture(binding, wgpu::TextureViewDimension::D3)
}

fn texture(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
        },
        count: None,
    }
}

fn texture2d(binding: u32) -> wgpu::BindGroupLayoutEntry {
    texture(binding, wgpu::TextureViewDimension::D2)
}

fn texture3d(binding: u32) -> wgpu::BindGroupLayoutEntry {
    texture(binding, wgpu::TextureViewDimension::D3)
}

fn sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Every compute program the precomputation runs. Binding 0 is always the
/// pass parameters and binding 1, where present, the shared sampler.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Pass {
    Transmittance,
    DirectIrradiance,
    SingleScattering,
    ScatteringDensity,
    IndirectIrradiance,
    MultipleScattering,
    CopyScattering,
    MergeSmoothSingleScattering,
    EclipsedDoubleScattering,
}

impl Pass {
    pub const ALL: [Pass; 9] = [
        Pass::Transmittance,
        Pass::DirectIrradiance,
        Pass::SingleScattering,
        Pass::ScatteringDensity,
        Pass::IndirectIrradiance,
        Pass::MultipleScattering,
        Pass::CopyScattering,
        Pass::MergeSmoothSingleScattering,
        Pass::EclipsedDoubleScattering,
    ];

    pub fn entry(self) -> &'static str {
        match self {
            Self::Transmittance => "compute-transmittance.comp",
            Self::DirectIrradiance => "compute-direct-irradiance.comp",
            Self::SingleScattering => "compute-single-scattering.comp",
            Self::ScatteringDensity => "compute-scattering-density.comp",
            Self::IndirectIrradiance => "compute-indirect-irradiance.comp",
            Self::MultipleScattering => "compute-multiple-scattering.comp",
            Self::CopyScattering => "copy-scattering-texture.comp",
            Self::MergeSmoothSingleScattering => "merge-smooth-single-scattering-texture.comp",
            Self::EclipsedDoubleScattering => "compute-eclipsed-double-scattering.comp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Transmittance => "atmosphere-transmittance",
            Self::DirectIrradiance => "atmosphere-direct-irradiance",
            Self::SingleScattering => "atmosphere-single-scattering",
            Self::ScatteringDensity => "atmosphere-scattering-density",
            Self::IndirectIrradiance => "atmosphere-indirect-irradiance",
            Self::MultipleScattering => "atmosphere-multiple-scattering",
            Self::CopyScattering => "atmosphere-copy-scattering",
            Self::MergeSmoothSingleScattering => "atmosphere-merge-smooth-single-scattering",
            Self::EclipsedDoubleScattering => "atmosphere-eclipsed-double-scattering",
        }
    }

    pub fn uses_sampler(self) -> bool {
        !matches!(self, Self::Transmittance)
    }

    fn layout_entries(self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let params = uniform(0, mem::size_of::<PassParameters>());
        match self {
            Self::Transmittance => vec![
                params,
                storage_texture2d(2), // out transmittance
            ],
            Self::DirectIrradiance => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                storage_texture2d(3), // out delta irradiance
                storage_texture2d(4), // out irradiance
            ],
            Self::SingleScattering => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                storage_texture3d(3), // out delta scattering
            ],
            Self::ScatteringDensity => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                texture2d(3),         // delta irradiance
                texture3d(4),         // delta scattering
                storage_texture3d(5), // out scattering density
            ],
            Self::IndirectIrradiance => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                texture3d(3),         // delta scattering
                storage_texture2d(4), // out delta irradiance
                storage_texture2d(5), // out irradiance
            ],
            Self::MultipleScattering => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                texture3d(3),         // scattering density
                storage_texture3d(4), // out delta scattering
            ],
            Self::CopyScattering | Self::MergeSmoothSingleScattering => vec![
                params,
                sampler(1),
                texture3d(2),         // source
                storage_texture3d(3), // target
            ],
            Self::EclipsedDoubleScattering => vec![
                params,
                sampler(1),
                texture2d(2),         // transmittance
                storage_texture2d(3), // out azimuth x elevation cell
            ],
        }
    }
}

/// Bind group layouts of every pass, made once per device, in the order
/// of `Pass::ALL`.
pub struct PassLayouts {
    layouts: Vec<wgpu::BindGroupLayout>,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let layouts = Pass::ALL
            .iter()
            .map(|pass| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}-bind-group-layout", pass.label())),
                    entries: &pass.layout_entries(),
                })
            })
            .collect();
        Self { layouts }
    }

    pub fn get(&self, pass: Pass) -> &wgpu::BindGroupLayout {
        &self.layouts[pass as usize]
    }

    pub fn create_pipeline(
        &self,
        device: &wgpu::Device,
        pass: Pass,
        module: &wgpu::ShaderModule,
    ) -> wgpu::ComputePipeline {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&format!("{}-pipeline", pass.label())),
            layout: Some(
                &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&format!("{}-pipeline-layout", pass.label())),
                    push_constant_ranges: &[],
                    bind_group_layouts: &[self.get(pass)],
                }),
            ),
            module,
            entry_point: "main",
        })
    }
}

/// Workgroups needed to cover `size` texels.
pub fn workgroups(size: u32) -> u32 {
    (size + BLOCK_SIZE - 1) / BLOCK_SIZE
}
