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
mod opts;

pub use crate::opts::{AdapterPreference, GpuOpts};

// Note: re-export so that dependent crates agree on the exact versions.
pub use naga;
pub use wgpu;

use anyhow::{anyhow, bail, ensure, Result};
use futures::executor::block_on;
use log::{info, trace};
use parking_lot::Mutex;
use std::{borrow::Cow, mem, num::NonZeroU32, sync::Arc};
use wgpu::util::DeviceExt;
use zerocopy::AsBytes;

pub fn texture_format_size(texture_format: wgpu::TextureFormat) -> u32 {
    let info = texture_format.describe();
    info.block_size as u32
}

/// A device and queue with no surface attached. Everything we do is
/// compute and copy, so there is no swap chain or depth buffer to manage.
pub struct Gpu {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Gpu {
    pub fn headless(opts: &GpuOpts, required_features: wgpu::Features) -> Result<Self> {
        block_on(Self::headless_async(opts, required_features))
    }

    pub async fn headless_async(opts: &GpuOpts, required_features: wgpu::Features) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
        let preference = opts.adapter();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: preference.power_preference(),
                force_fallback_adapter: preference.force_fallback_adapter(),
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| anyhow!("no suitable graphics adapter"))?;
        let info = adapter.get_info();
        info!(
            "using adapter {} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );

        let missing = required_features - adapter.features();
        if !missing.is_empty() {
            bail!(
                "graphics adapter {} does not support required features: {:?}",
                info.name,
                missing
            );
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("headless-device"),
                    features: required_features,
                    limits: adapter.limits(),
                },
                opts.api_trace(),
            )
            .await?;

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
        })
    }

    /// Bring up whatever adapter the test machine has with the features
    /// our compute passes need.
    pub fn for_test() -> Result<Self> {
        Self::headless(
            &GpuOpts::default(),
            wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
        )
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    pub fn push_data<T: AsBytes>(
        &self,
        label: &'static str,
        data: &T,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let size = mem::size_of::<T>() as wgpu::BufferAddress;
        trace!("uploading {} with {} bytes", label, size);
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data.as_bytes(),
                usage,
            })
    }

    pub fn write_data<T: AsBytes>(&self, buffer: &wgpu::Buffer, data: &T) {
        self.queue.write_buffer(buffer, 0, data.as_bytes());
    }

    /// Run `f` with the device under an error scope of the given kind and
    /// report anything the scope caught as an error naming `what`.
    pub fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        what: &str,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T> {
        self.device.push_error_scope(filter);
        let out = f(&self.device);
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            bail!("{}: {}", what, err);
        }
        Ok(out)
    }

    pub fn create_glsl_shader_module(
        &self,
        label: &str,
        source: &str,
        stage: naga::ShaderStage,
    ) -> Result<wgpu::ShaderModule> {
        self.scoped(
            wgpu::ErrorFilter::Validation,
            &format!("failed to create shader module {}", label),
            |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Borrowed(source),
                        stage,
                        defines: Default::default(),
                    },
                })
            },
        )
    }

    pub fn stride_for_row_size(size: u32) -> u32 {
        (size + wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1) / wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
    }

    /// Size of a download buffer that can hold `extent` of `format` with
    /// the row padding that texture-to-buffer copies require.
    pub fn readback_size(extent: wgpu::Extent3d, format: wgpu::TextureFormat) -> u64 {
        let bytes_per_row = Self::stride_for_row_size(extent.width * texture_format_size(format));
        u64::from(bytes_per_row)
            * u64::from(extent.height)
            * u64::from(extent.depth_or_array_layers)
    }

    /// Submit and block until the device has drained the queue.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Copy `texture` into `readback` and unpack the rows into `out`,
    /// dropping the row alignment padding.
    pub fn read_texture(
        &self,
        texture: &wgpu::Texture,
        extent: wgpu::Extent3d,
        format: wgpu::TextureFormat,
        readback: &wgpu::Buffer,
        out: &mut [f32],
    ) -> Result<()> {
        let texel_size = texture_format_size(format) as usize;
        let row_size = extent.width as usize * texel_size;
        let rows = extent.height as usize * extent.depth_or_array_layers as usize;
        ensure!(
            out.len() * mem::size_of::<f32>() == row_size * rows,
            "readback target holds {} floats but the texture needs {} bytes",
            out.len(),
            row_size * rows
        );
        let bytes_per_row = Self::stride_for_row_size(row_size as u32);
        let download_size = Self::readback_size(extent, format);
        ensure!(
            download_size <= readback.size(),
            "readback buffer of {} bytes is too small for {} bytes",
            readback.size(),
            download_size
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback-command-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: NonZeroU32::new(bytes_per_row),
                    rows_per_image: NonZeroU32::new(extent.height),
                },
            },
            extent,
        );
        self.submit_and_wait(encoder);

        let waiter = Arc::new(Mutex::new(None));
        let map_waiter = waiter.clone();
        let slice = readback.slice(..download_size);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            *map_waiter.lock() = Some(result);
        });
        while waiter.lock().is_none() {
            self.device.poll(wgpu::Maintain::Wait);
        }
        if let Some(Err(err)) = waiter.lock().take() {
            bail!("failed to map readback buffer: {}", err);
        }

        {
            let mapping = slice.get_mapped_range();
            let dst = out.as_bytes_mut();
            for (row, chunk) in dst.chunks_exact_mut(row_size).enumerate() {
                let start = row * bytes_per_row as usize;
                chunk.copy_from_slice(&mapping[start..start + row_size]);
            }
        }
        readback.unmap();
        Ok(())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}
