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

// Everything the renderer reads: `.f32` tables (u16 dimension sizes, then
// four native-endian f32 per texel) and the exact program text of every
// variant, under one output root.
use crate::{
    console,
    context::PipelineContext,
    error::Error,
    options::{DebugOutputs, PrecomputeOptions},
    params::{
        AtmosphereParameters, PhaseFunctionType, Scatterer, ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE,
        NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE,
    },
    program::SourceUnit,
    textures::TextureRole,
};
use anyhow::Result;
use log::debug;
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use zerocopy::AsBytes;

const TEXEL_COMPONENTS: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SingleScatteringMode {
    OnTheFly,
    Precomputed,
}

impl SingleScatteringMode {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::OnTheFly => "on-the-fly",
            Self::Precomputed => "precomputed",
        }
    }
}

/// Where under `shaders/` the programs of one variant go.
#[derive(Clone, Copy, Debug)]
pub enum ShaderDir<'a> {
    ZeroOrder(usize),
    EclipsedZeroOrder(usize),
    SingleScattering {
        eclipsed: bool,
        mode: SingleScatteringMode,
        tex_index: usize,
        scatterer: &'a Scatterer,
    },
    EclipsedSingleScatteringPrecomputation(usize, &'a str),
    EclipsedDoubleScatteringPrecomputed(usize),
    EclipsedDoubleScatteringPrecomputation(usize),
    /// Per wavelength set when saving radiance, else one for all sets.
    MultipleScattering(Option<usize>),
}

impl<'a> ShaderDir<'a> {
    pub fn path(&self, out_dir: &Path) -> PathBuf {
        let shaders = out_dir.join("shaders");
        match *self {
            Self::ZeroOrder(i) => shaders.join("zero-order-scattering").join(i.to_string()),
            Self::EclipsedZeroOrder(i) => shaders
                .join("eclipsed-zero-order-scattering")
                .join(i.to_string()),
            Self::SingleScattering {
                eclipsed,
                mode,
                tex_index,
                scatterer,
            } => {
                let kind = if eclipsed {
                    "single-scattering-eclipsed"
                } else {
                    "single-scattering"
                };
                let base = shaders.join(kind).join(mode.dir_name());
                // Luminance tables cover every wavelength set at once.
                if mode == SingleScatteringMode::OnTheFly
                    || scatterer.phase_function_type == PhaseFunctionType::General
                {
                    base.join(tex_index.to_string()).join(&scatterer.name)
                } else {
                    base.join(&scatterer.name)
                }
            }
            Self::EclipsedSingleScatteringPrecomputation(i, name) => shaders
                .join("single-scattering-eclipsed")
                .join("precomputation")
                .join(i.to_string())
                .join(name),
            Self::EclipsedDoubleScatteringPrecomputed(i) => shaders
                .join("double-scattering-eclipsed")
                .join("precomputed")
                .join(i.to_string()),
            Self::EclipsedDoubleScatteringPrecomputation(i) => shaders
                .join("double-scattering-eclipsed")
                .join("precomputation")
                .join(i.to_string()),
            Self::MultipleScattering(Some(i)) => {
                shaders.join("multiple-scattering").join(i.to_string())
            }
            Self::MultipleScattering(None) => shaders.join("multiple-scattering"),
        }
    }
}

/// Every directory a run writes into.
pub fn output_directories(
    atmo: &AtmosphereParameters,
    radiance: bool,
    out_dir: &Path,
) -> Vec<PathBuf> {
    use SingleScatteringMode::*;
    let mut dirs = Vec::new();
    let single = |eclipsed: bool,
                  mode: SingleScatteringMode,
                  tex_index: usize,
                  scatterer: &Scatterer| {
        ShaderDir::SingleScattering {
            eclipsed,
            mode,
            tex_index,
            scatterer,
        }
        .path(out_dir)
    };
    for scatterer in &atmo.scatterers {
        for i in 0..atmo.wavelength_set_count() {
            dirs.push(
                ShaderDir::EclipsedSingleScatteringPrecomputation(i, &scatterer.name).path(out_dir),
            );
            dirs.push(single(true, OnTheFly, i, scatterer));
            if scatterer.phase_function_type != PhaseFunctionType::Smooth {
                dirs.push(single(false, OnTheFly, i, scatterer));
            }
            if scatterer.phase_function_type == PhaseFunctionType::General {
                dirs.push(single(false, Precomputed, i, scatterer));
                dirs.push(single(true, Precomputed, i, scatterer));
            }
        }
        match scatterer.phase_function_type {
            PhaseFunctionType::General => {}
            PhaseFunctionType::Achromatic => {
                dirs.push(single(false, Precomputed, 0, scatterer));
                dirs.push(single(true, Precomputed, 0, scatterer));
            }
            PhaseFunctionType::Smooth => {
                dirs.push(single(true, Precomputed, 0, scatterer));
            }
        }
    }
    for i in 0..atmo.wavelength_set_count() {
        dirs.push(ShaderDir::ZeroOrder(i).path(out_dir));
        dirs.push(ShaderDir::EclipsedZeroOrder(i).path(out_dir));
        dirs.push(ShaderDir::EclipsedDoubleScatteringPrecomputed(i).path(out_dir));
        dirs.push(ShaderDir::EclipsedDoubleScatteringPrecomputation(i).path(out_dir));
        dirs.push(out_dir.join("single-scattering").join(i.to_string()));
    }
    dirs.push(ShaderDir::MultipleScattering(None).path(out_dir));
    if radiance {
        for i in 0..atmo.wavelength_set_count() {
            dirs.push(ShaderDir::MultipleScattering(Some(i)).path(out_dir));
        }
    }
    dirs
}

pub fn create_output_directories(
    atmo: &AtmosphereParameters,
    options: &PrecomputeOptions,
) -> Result<()> {
    for dir in output_directories(atmo, options.save_result_as_radiance(), options.out_dir()) {
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    }
    Ok(())
}

/// The description as the renderer should read it: the directives of
/// this run first, then the original text verbatim. A directive the text
/// already carries is not written twice.
pub fn params_manifest(description: &str, radiance: bool, no_eds_textures: bool) -> String {
    let mut prepended = Vec::new();
    if radiance {
        prepended.push(ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE);
    }
    if no_eds_textures {
        prepended.push(NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE);
    }
    let mut out = String::new();
    for directive in &prepended {
        out += directive;
        out.push('\n');
    }
    for line in description.split_inclusive('\n') {
        if prepended.iter().any(|directive| *directive == line.trim()) {
            continue;
        }
        out += line;
    }
    out
}

pub fn write_params_manifest(atmo: &AtmosphereParameters, options: &PrecomputeOptions) -> Result<()> {
    let path = options.out_dir().join("params.atmo");
    console::note(&format!("Writing parameters to \"{}\"", path.display()));
    let text = params_manifest(
        &atmo.description_file_text,
        options.save_result_as_radiance(),
        options.debug(DebugOutputs::NO_EDS_TEXTURES),
    );
    fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    Ok(())
}

pub fn save_texture(path: &Path, dims: &[u32], data: &[f32]) -> Result<()> {
    let texels = dims.iter().map(|d| *d as usize).product::<usize>();
    if texels * TEXEL_COMPONENTS != data.len() {
        return Err(Error::Resource(format!(
            "{:?} describes {} texels but {} floats were given for {}",
            dims,
            texels,
            data.len(),
            path.display()
        ))
        .into());
    }
    let mut header = Vec::with_capacity(dims.len());
    for dim in dims {
        let dim = u16::try_from(*dim).map_err(|_| {
            Error::Resource(format!(
                "dimension {} of {} does not fit the file header",
                dim,
                path.display()
            ))
        })?;
        header.push(dim);
    }

    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    out.write_all(header.as_bytes())
        .and_then(|_| out.write_all(data.as_bytes()))
        .and_then(|_| out.flush())
        .map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Read a table written by `save_texture` into the front of `staging`.
/// The header must hold `dim_count` sizes whose product is
/// `expected_texels`; short data is an error, never a partial load.
pub fn load_texture(
    path: &Path,
    dim_count: usize,
    expected_texels: usize,
    staging: &mut [f32],
) -> Result<Vec<u16>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let header_len = dim_count * 2;
    if bytes.len() < header_len {
        return Err(Error::Resource(format!("Truncated header in file {}", path.display())).into());
    }
    let dims = bytes[..header_len]
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect::<Vec<_>>();
    if dims.iter().map(|d| *d as usize).product::<usize>() != expected_texels {
        return Err(Error::Resource(format!("Bad texture size in file {}", path.display())).into());
    }

    let floats = expected_texels * TEXEL_COMPONENTS;
    let data = &bytes[header_len..];
    if data.len() < floats * 4 {
        return Err(Error::Resource(format!(
            "{} holds {} bytes of texels, expected {}",
            path.display(),
            data.len(),
            floats * 4
        ))
        .into());
    }
    if staging.len() < floats {
        return Err(Error::Resource(format!(
            "staging buffer of {} floats cannot hold {}",
            staging.len(),
            path.display()
        ))
        .into());
    }
    staging[..floats]
        .as_bytes_mut()
        .copy_from_slice(&data[..floats * 4]);
    Ok(dims)
}

pub fn save_shaders(out_dir: &Path, dir: ShaderDir, units: &[SourceUnit]) -> Result<()> {
    let dir = dir.path(out_dir);
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    for (name, text) in units {
        let path = dir.join(name);
        debug!("saving shader {}", path.display());
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

pub fn transmittance_dims(atmo: &AtmosphereParameters) -> [u32; 2] {
    [atmo.transmittance_tex_w, atmo.transmittance_tex_h]
}

pub fn irradiance_dims(atmo: &AtmosphereParameters) -> [u32; 2] {
    [atmo.irradiance_tex_w, atmo.irradiance_tex_h]
}

pub fn scattering_dims(atmo: &AtmosphereParameters) -> [u32; 4] {
    atmo.scattering_texture_size
}

/// Read back one of the working images and write it under the output root.
pub fn save_image(
    ctx: &mut PipelineContext,
    role: TextureRole,
    what: &str,
    file_name: &str,
    dims: &[u32],
) -> Result<()> {
    let path = ctx.options().out_dir().join(file_name);
    console::note(&format!("Saving {} to \"{}\"", what, path.display()));
    let gpu = ctx.gpu();
    let data = ctx.textures_mut().read_back(gpu, role)?;
    save_texture(&path, dims, data)
}

pub fn save_accumulator(ctx: &mut PipelineContext, scatterer: &str, file_name: &str) -> Result<()> {
    let path = ctx.options().out_dir().join(file_name);
    console::note(&format!(
        "Saving accumulated single scattering of {} to \"{}\"",
        scatterer,
        path.display()
    ));
    let dims = scattering_dims(ctx.atmo());
    let gpu = ctx.gpu();
    let data = ctx.textures_mut().read_back_accumulator(gpu, scatterer)?;
    save_texture(&path, &dims, data)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::{parse_description, test::EARTH};

    #[test]
    fn test_save_then_load_is_exact() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.f32");
        let data = (0..2 * 3 * 4)
            .map(|i| (i as f32).sqrt() * 1.0e-3 - 0.01)
            .collect::<Vec<_>>();
        save_texture(&path, &[3, 2], &data)?;

        let bytes = fs::read(&path)?;
        assert_eq!(bytes.len(), 2 * 2 + data.len() * 4);
        assert_eq!(&bytes[4..], data.as_bytes());

        let mut staging = vec![0f32; 64];
        let dims = load_texture(&path, 2, 6, &mut staging)?;
        assert_eq!(dims, vec![3, 2]);
        assert_eq!(&staging[..data.len()], &data[..]);
        Ok(())
    }

    #[test]
    fn test_load_rejects_wrong_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.f32");
        save_texture(&path, &[2, 2, 1, 1], &[1f32; 16])?;
        let mut staging = vec![0f32; 64];
        let err = load_texture(&path, 4, 8, &mut staging).unwrap_err();
        assert!(err.to_string().contains("Bad texture size in file"));
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Resource(_))));
        Ok(())
    }

    #[test]
    fn test_load_rejects_short_data() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.f32");
        save_texture(&path, &[4, 2], &[0.5f32; 32])?;
        let full = fs::read(&path)?;
        fs::write(&path, &full[..full.len() - 4])?;
        let mut staging = vec![0f32; 64];
        assert!(load_texture(&path, 2, 8, &mut staging).is_err());
        Ok(())
    }

    #[test]
    fn test_save_rejects_mismatched_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.f32");
        assert!(save_texture(&path, &[4, 4], &[0f32; 60]).is_err());
        assert!(save_texture(&path, &[70_000, 1], &vec![0f32; 280_000]).is_err());
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let err = save_texture(Path::new("/nonexistent/dir/t.f32"), &[1], &[0f32; 4]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Io { .. })));
    }

    #[test]
    fn test_shader_paths_follow_phase_function_type() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let root = Path::new("out");
        let rayleigh = &atmo.scatterers[0];
        let mie = &atmo.scatterers[1];
        let dir = |eclipsed: bool, mode: SingleScatteringMode, scatterer: &Scatterer| {
            ShaderDir::SingleScattering {
                eclipsed,
                mode,
                tex_index: 2,
                scatterer,
            }
            .path(root)
        };
        assert_eq!(
            dir(false, SingleScatteringMode::Precomputed, mie),
            Path::new("out/shaders/single-scattering/precomputed/2/mie")
        );
        assert_eq!(
            dir(true, SingleScatteringMode::Precomputed, rayleigh),
            Path::new("out/shaders/single-scattering-eclipsed/precomputed/rayleigh")
        );
        assert_eq!(
            dir(true, SingleScatteringMode::OnTheFly, rayleigh),
            Path::new("out/shaders/single-scattering-eclipsed/on-the-fly/2/rayleigh")
        );
        assert_eq!(
            ShaderDir::MultipleScattering(None).path(root),
            Path::new("out/shaders/multiple-scattering")
        );
        Ok(())
    }

    #[test]
    fn test_output_directories() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let root = Path::new("out");
        let dirs = output_directories(&atmo, false, root);
        assert!(dirs.contains(&root.join("single-scattering/3")));
        assert!(dirs.contains(&root.join("shaders/single-scattering/on-the-fly/0/mie")));
        // smooth scatterers are merged into multiple scattering
        assert!(!dirs.contains(&root.join("shaders/single-scattering/on-the-fly/0/rayleigh")));
        assert!(!dirs.contains(&root.join("shaders/multiple-scattering/0")));
        let dirs = output_directories(&atmo, true, root);
        assert!(dirs.contains(&root.join("shaders/multiple-scattering/3")));
        Ok(())
    }

    #[test]
    fn test_manifest_directives() {
        let description = "earth radius: 6371 km\nall textures are radiances\nscattering orders: 4\n";
        let manifest = params_manifest(description, false, true);
        assert_eq!(
            manifest,
            format!("no eclipsed double scattering textures\n{}", description)
        );
        let manifest = params_manifest(description, true, false);
        assert_eq!(manifest.matches(ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE).count(), 1);
        assert!(manifest.starts_with(ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE));
    }
}
