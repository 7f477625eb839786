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
use anyhow::Result;
use approx::assert_relative_eq;
use atmosphere::{
    load_texture, parse_description, AtmosphereParameters, DebugOutputs, Precompute,
    PrecomputeOptions, ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE,
    NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE,
};
use gpu::Gpu;
use std::{fs, path::Path};

const EARTH: &str = include_str!("../data/earth.atmo");

// Small enough to run in seconds on a software adapter.
fn tiny_earth() -> String {
    let sizes = [
        ("transmittance texture size for VZA: 64", "transmittance texture size for VZA: 16"),
        ("transmittance texture size for altitude: 32", "transmittance texture size for altitude: 8"),
        ("irradiance texture size for SZA: 64", "irradiance texture size for SZA: 8"),
        ("irradiance texture size for altitude: 16", "irradiance texture size for altitude: 4"),
        ("scattering texture size for VZA: 64", "scattering texture size for VZA: 8"),
        ("scattering texture size for dot(view,sun): 16", "scattering texture size for dot(view,sun): 4"),
        ("scattering texture size for SZA: 32", "scattering texture size for SZA: 4"),
        ("scattering texture size for altitude: 16", "scattering texture size for altitude: 4"),
        (
            "eclipsed double scattering texture size for relative azimuth: 16",
            "eclipsed double scattering texture size for relative azimuth: 4",
        ),
        (
            "eclipsed double scattering texture size for VZA: 16",
            "eclipsed double scattering texture size for VZA: 4",
        ),
        (
            "eclipsed double scattering texture size for SZA: 8",
            "eclipsed double scattering texture size for SZA: 2",
        ),
        (
            "eclipsed double scattering texture size for altitude: 8",
            "eclipsed double scattering texture size for altitude: 2",
        ),
        ("transmittance integration points: 500", "transmittance integration points: 50"),
        ("radial integration points: 50", "radial integration points: 10"),
        ("angular integration points: 16", "angular integration points: 4"),
        ("angular integration points for eclipse: 64", "angular integration points for eclipse: 8"),
        ("scattering orders: 4", "scattering orders: 3"),
    ];
    let mut text = EARTH.to_owned();
    for (from, to) in sizes {
        assert!(text.contains(from), "earth.atmo no longer has \"{}\"", from);
        text = text.replacen(from, to, 1);
    }
    text
}

fn run(text: &str, options: PrecomputeOptions) -> Result<AtmosphereParameters> {
    let gpu = Gpu::for_test()?;
    let atmo = parse_description("tiny.atmo", text)?;
    let precompute = Precompute::new(atmo, options);
    precompute.run(&gpu)?;
    Ok(precompute.atmosphere().clone())
}

fn load(path: &Path, dims: &[u32]) -> Result<Vec<f32>> {
    let texels = dims.iter().map(|d| *d as usize).product::<usize>();
    let mut data = vec![0f32; texels * 4];
    let header = load_texture(path, dims.len(), texels, &mut data)?;
    assert_eq!(header, dims.iter().map(|d| *d as u16).collect::<Vec<_>>());
    Ok(data)
}

fn no_eds(out: &Path) -> PrecomputeOptions {
    PrecomputeOptions::new(out).with_debug(DebugOutputs::NO_EDS_TEXTURES)
}

#[ignore] // requires a GPU adapter
#[test]
fn test_transmittance_is_a_fraction() -> Result<()> {
    let out = tempfile::tempdir()?;
    let atmo = run(&tiny_earth(), no_eds(out.path()))?;
    let dims = [atmo.transmittance_tex_w, atmo.transmittance_tex_h];
    for tex_index in 0..atmo.wavelength_set_count() {
        let path = out.path().join(format!("transmittance-wlset{}.f32", tex_index));
        let data = load(&path, &dims)?;
        assert!(data.iter().all(|v| v.is_finite() && *v >= 0. && *v <= 1.0001));
        // Some light makes it through somewhere.
        assert!(data.iter().any(|v| *v > 0.5));

        // Path length grows along each row.
        let (w, h) = (dims[0] as usize, dims[1] as usize);
        for y in 0..h {
            for x in 1..w {
                for c in 0..4 {
                    let prev = data[(y * w + x - 1) * 4 + c];
                    let next = data[(y * w + x) * 4 + c];
                    assert!(next <= prev * 1.0001 + 1e-6, "row {} texel {}: {} > {}", y, x, next, prev);
                }
            }
        }
    }
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_every_table_header_matches_its_size() -> Result<()> {
    let out = tempfile::tempdir()?;
    let options = PrecomputeOptions::new(out.path()).with_debug(
        DebugOutputs::SAVE_SCAT_DENSITY
            | DebugOutputs::SAVE_DELTA_SCATTERING
            | DebugOutputs::SAVE_GROUND_IRRADIANCE,
    );
    run(&tiny_earth(), options)?;

    let mut pending = vec![out.path().to_owned()];
    let mut checked = 0;
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().map_or(true, |ext| ext != "f32") {
                continue;
            }
            let bytes = fs::read(&path)?;
            // Scattering tables carry four dims, the rest two.
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let dim_count = if name.starts_with("transmittance") || name.starts_with("irradiance") {
                2
            } else {
                4
            };
            let texels = bytes[..dim_count * 2]
                .chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]]) as usize)
                .product::<usize>();
            assert_eq!(
                bytes.len() - dim_count * 2,
                texels * 4 * 4,
                "{}",
                path.display()
            );
            checked += 1;
        }
    }
    assert!(checked > 10);
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_luminance_outputs() -> Result<()> {
    let out = tempfile::tempdir()?;
    let atmo = run(&tiny_earth(), no_eds(out.path()))?;
    let root = out.path();
    let scattering = atmo.scattering_texture_size;

    // General scatterers keep radiance per set; smooth ones are merged.
    for tex_index in 0..atmo.wavelength_set_count() {
        assert!(root.join(format!("single-scattering/{}/mie.f32", tex_index)).is_file());
        assert!(root.join(format!("irradiance-wlset{}.f32", tex_index)).is_file());
        assert!(root
            .join(format!("shaders/zero-order-scattering/{}/render.frag", tex_index))
            .is_file());
        assert!(root
            .join(format!("shaders/double-scattering-eclipsed/precomputation/{}", tex_index))
            .read_dir()?
            .next()
            .is_some());
        assert!(!root.join(format!("eclipsed-double-scattering-wlset{}.f32", tex_index)).exists());
    }
    assert!(!root.join("single-scattering/rayleigh-xyzw.f32").exists());
    assert!(root.join("shaders/multiple-scattering/render.frag").is_file());
    assert!(!root.join("shaders/multiple-scattering/0").exists());
    assert!(!root
        .join("shaders/single-scattering/on-the-fly/0/rayleigh")
        .exists());
    assert!(root
        .join("shaders/single-scattering-eclipsed/precomputed/rayleigh/render.frag")
        .is_file());
    // The renderer supplies its own view direction.
    assert!(!root
        .join("shaders/multiple-scattering/calc-view-dir.frag")
        .exists());

    let data = load(&root.join("multiple-scattering-xyzw.f32"), &scattering)?;
    assert!(data.iter().all(|v| v.is_finite()));
    assert!(data.iter().any(|v| *v > 0.));

    let manifest = fs::read_to_string(root.join("params.atmo"))?;
    assert!(manifest.starts_with(NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE));
    assert!(!manifest.contains(ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE));
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_radiance_outputs() -> Result<()> {
    let out = tempfile::tempdir()?;
    let atmo = run(&tiny_earth(), no_eds(out.path()).with_radiance(true))?;
    let root = out.path();
    for tex_index in 0..atmo.wavelength_set_count() {
        let path = root.join(format!("multiple-scattering-wlset{}.f32", tex_index));
        let data = load(&path, &atmo.scattering_texture_size)?;
        assert!(data.iter().all(|v| v.is_finite() && *v >= 0.));
        assert!(root
            .join(format!("shaders/multiple-scattering/{}/render.frag", tex_index))
            .is_file());
        // Every scatterer is stored as radiance.
        assert!(root.join(format!("single-scattering/{}/rayleigh.f32", tex_index)).is_file());
    }
    assert!(!root.join("multiple-scattering-xyzw.f32").exists());
    let manifest = fs::read_to_string(root.join("params.atmo"))?;
    assert!(manifest.starts_with(ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE));
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_eclipsed_double_scattering_table() -> Result<()> {
    let out = tempfile::tempdir()?;
    let atmo = run(&tiny_earth(), PrecomputeOptions::new(out.path()))?;
    let size = atmo.eclipsed_double_scattering_texture_size;
    for tex_index in 0..atmo.wavelength_set_count() {
        let path = out
            .path()
            .join(format!("eclipsed-double-scattering-wlset{}.f32", tex_index));
        let data = load(&path, &size)?;
        assert!(data.iter().all(|v| v.is_finite() && *v >= 0.));
    }
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_scatterer_order_does_not_matter() -> Result<()> {
    let text = tiny_earth();
    let rayleigh_start = text.find("scatterer \"rayleigh\"").expect("rayleigh");
    let mie_start = text.find("scatterer \"mie\"").expect("mie");
    let absorber_start = text.find("absorber \"ozone\"").expect("ozone");
    let swapped = format!(
        "{}{}{}{}",
        &text[..rayleigh_start],
        &text[mie_start..absorber_start],
        &text[rayleigh_start..mie_start],
        &text[absorber_start..]
    );

    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    let atmo = run(&text, no_eds(first.path()))?;
    run(&swapped, no_eds(second.path()))?;

    let dims = atmo.scattering_texture_size;
    let a = load(&first.path().join("multiple-scattering-xyzw.f32"), &dims)?;
    let b = load(&second.path().join("multiple-scattering-xyzw.f32"), &dims)?;
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-3, epsilon = 1e-6);
    }
    Ok(())
}

#[ignore] // requires a GPU adapter
#[test]
fn test_skipping_textures_still_writes_programs() -> Result<()> {
    let out = tempfile::tempdir()?;
    let options = PrecomputeOptions::new(out.path())
        .with_debug(DebugOutputs::NO_SAVE_TEXTURES | DebugOutputs::NO_EDS_TEXTURES);
    run(&tiny_earth(), options)?;
    assert!(out
        .path()
        .join("shaders/single-scattering/on-the-fly/0/mie/render.frag")
        .is_file());
    assert!(out
        .path()
        .join("shaders/single-scattering-eclipsed/precomputation/0/mie/compute-eclipsed-single-scattering.comp")
        .is_file());
    Ok(())
}
