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
    error::Error,
    params::{
        Absorber, AtmosphereParameters, PhaseFunctionType, Scatterer,
        ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE, NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE,
        POINTS_PER_WAVELENGTH_ITEM,
    },
};
use anyhow::Result;
use fxhash::FxHashMap;
use log::debug;
use nalgebra::Vector4;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{fs, path::Path};

const CODE_FENCE: &str = "```";
const ASTRONOMICAL_UNIT: f64 = 149_597_870_700.;

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(scatterer|absorber)\s+"([^"]*)"\s*:$"#).expect("static regex")
});
static GLSL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

pub fn parse_description_file(path: &Path) -> Result<AtmosphereParameters> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_description(&path.display().to_string(), &text)
}

struct Line<'a> {
    number: usize,
    text: &'a str,
}

/// Walks the description one significant line at a time, remembering
/// where we are so that every failure can point at a line.
struct LineReader<'a> {
    file: &'a str,
    lines: Vec<Line<'a>>,
    offset: usize,
}

impl<'a> LineReader<'a> {
    fn new(file: &'a str, text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(i, text)| Line {
                number: i + 1,
                text,
            })
            .collect();
        Self {
            file,
            lines,
            offset: 0,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> anyhow::Error {
        Error::parsing(self.file, line, message).into()
    }

    fn last_line(&self) -> usize {
        self.lines.len()
    }

    /// Next line that is neither blank nor a comment, trimmed.
    fn next_significant(&mut self) -> Option<(usize, &'a str)> {
        while self.offset < self.lines.len() {
            let line = &self.lines[self.offset];
            self.offset += 1;
            let text = line.text.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return Some((line.number, text));
        }
        None
    }

    /// Everything up to the closing fence, verbatim.
    fn fenced_block(&mut self, opened_at: usize) -> Result<String> {
        let mut body = Vec::new();
        while self.offset < self.lines.len() {
            let line = &self.lines[self.offset];
            self.offset += 1;
            if line.text.trim() == CODE_FENCE {
                return Ok(body.join("\n"));
            }
            body.push(line.text);
        }
        Err(self.error(opened_at, "unterminated code block"))
    }

    /// Split `key: value`; a value of a lone fence is replaced by the
    /// fenced block that follows.
    fn entry(&mut self, number: usize, text: &'a str) -> Result<(String, String)> {
        let (key, value) = text
            .split_once(':')
            .ok_or_else(|| self.error(number, format!("expected \"key: value\", got \"{}\"", text)))?;
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value == CODE_FENCE {
            return Ok((key, self.fenced_block(number)?));
        }
        Ok((key, value.to_owned()))
    }
}

#[derive(Default)]
struct Entries {
    values: FxHashMap<String, (usize, String)>,
}

impl Entries {
    fn insert(&mut self, reader: &LineReader, line: usize, key: String, value: String) -> Result<()> {
        if let Some((previous, _)) = self.values.get(&key) {
            return Err(reader.error(
                line,
                format!("duplicate key \"{}\", first given on line {}", key, previous),
            ));
        }
        self.values.insert(key, (line, value));
        Ok(())
    }

    fn take(&mut self, reader: &LineReader, key: &str, at: usize) -> Result<(usize, String)> {
        self.values
            .remove(key)
            .ok_or_else(|| reader.error(at, format!("missing key \"{}\"", key)))
    }

    fn finish(self, reader: &LineReader) -> Result<()> {
        if let Some((key, (line, _))) = self.values.into_iter().min_by_key(|(_, (line, _))| *line) {
            return Err(reader.error(line, format!("unknown key \"{}\"", key)));
        }
        Ok(())
    }
}

fn parse_number(reader: &LineReader, line: usize, value: &str) -> Result<f64> {
    let v: f64 = value
        .trim()
        .parse()
        .map_err(|_| reader.error(line, format!("failed to parse number \"{}\"", value)))?;
    if !v.is_finite() {
        return Err(reader.error(line, format!("number \"{}\" is not finite", value)));
    }
    Ok(v)
}

fn parse_uint(reader: &LineReader, line: usize, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| reader.error(line, format!("failed to parse integer \"{}\"", value)))
}

/// Texture dimensions end up in 16-bit file headers.
fn parse_texture_size(reader: &LineReader, line: usize, value: &str, min: u32) -> Result<u32> {
    let v = parse_uint(reader, line, value)?;
    if v < min || v > u32::from(u16::MAX) {
        return Err(reader.error(
            line,
            format!("texture size {} is out of range [{}, {}]", v, min, u16::MAX),
        ));
    }
    Ok(v)
}

fn split_quantity(value: &str) -> (&str, &str) {
    let value = value.trim();
    let split = value
        .find(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
        .unwrap_or(value.len());
    (value[..split].trim(), value[split..].trim())
}

fn parse_length(reader: &LineReader, line: usize, value: &str) -> Result<f64> {
    let (number, unit) = split_quantity(value);
    let scale = match unit {
        "m" => 1.,
        "km" => 1e3,
        "au" | "AU" => ASTRONOMICAL_UNIT,
        "" => return Err(reader.error(line, format!("length \"{}\" has no unit", value))),
        _ => return Err(reader.error(line, format!("unknown length unit \"{}\"", unit))),
    };
    let v = parse_number(reader, line, number)? * scale;
    if v <= 0. {
        return Err(reader.error(line, "length must be positive"));
    }
    Ok(v)
}

fn parse_area(reader: &LineReader, line: usize, value: &str) -> Result<f64> {
    let (number, unit) = split_quantity(value);
    let scale = match unit {
        "m^2" => 1.,
        "cm^2" => 1e-4,
        "um^2" => 1e-12,
        "" => return Err(reader.error(line, format!("cross section \"{}\" has no unit", value))),
        _ => return Err(reader.error(line, format!("unknown area unit \"{}\"", unit))),
    };
    Ok(parse_number(reader, line, number)? * scale)
}

fn parse_wavelength(reader: &LineReader, line: usize, value: &str) -> Result<f64> {
    let (number, unit) = split_quantity(value);
    if unit != "nm" {
        return Err(reader.error(line, format!("wavelength \"{}\" must be given in nm", value)));
    }
    parse_number(reader, line, number)
}

fn group_by_four(values: &[f64]) -> Vec<Vector4<f64>> {
    values
        .chunks_exact(POINTS_PER_WAVELENGTH_ITEM)
        .map(|c| Vector4::new(c[0], c[1], c[2], c[3]))
        .collect()
}

fn parse_wavelengths(reader: &LineReader, line: usize, value: &str) -> Result<Vec<Vector4<f64>>> {
    let wavelengths = if value.trim_start().starts_with("min=") {
        let mut range = FxHashMap::default();
        for part in value.split(',') {
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| reader.error(line, format!("bad wavelength range part \"{}\"", part)))?;
            range.insert(k.trim().to_owned(), v.trim().to_owned());
        }
        let get = |k: &str| {
            range
                .get(k)
                .ok_or_else(|| reader.error(line, format!("wavelength range lacks \"{}\"", k)))
        };
        let min = parse_wavelength(reader, line, get("min")?)?;
        let max = parse_wavelength(reader, line, get("max")?)?;
        let count = parse_uint(reader, line, get("count")?)? as usize;
        if count < 2 || max <= min {
            return Err(reader.error(line, "wavelength range must have max > min and count >= 2"));
        }
        (0..count)
            .map(|i| min + (max - min) * i as f64 / (count - 1) as f64)
            .collect::<Vec<_>>()
    } else {
        value
            .split(',')
            .map(|wl| parse_wavelength(reader, line, wl))
            .collect::<Result<Vec<_>>>()?
    };
    if wavelengths.is_empty() || wavelengths.len() % POINTS_PER_WAVELENGTH_ITEM != 0 {
        return Err(reader.error(
            line,
            format!(
                "number of wavelengths must be a non-zero multiple of {}, got {}",
                POINTS_PER_WAVELENGTH_ITEM,
                wavelengths.len()
            ),
        ));
    }
    Ok(group_by_four(&wavelengths))
}

/// Either `const X` or one comma separated value per wavelength.
fn parse_spectrum(
    reader: &LineReader,
    line: usize,
    value: &str,
    wavelength_count: usize,
    parse_value: impl Fn(&LineReader, usize, &str) -> Result<f64>,
) -> Result<Vec<Vector4<f64>>> {
    let values = if let Some(constant) = value.trim().strip_prefix("const ") {
        vec![parse_value(reader, line, constant)?; wavelength_count]
    } else {
        value
            .split(',')
            .map(|v| parse_value(reader, line, v))
            .collect::<Result<Vec<_>>>()?
    };
    if values.len() != wavelength_count {
        return Err(reader.error(
            line,
            format!(
                "spectrum has {} values, but there are {} wavelengths",
                values.len(),
                wavelength_count
            ),
        ));
    }
    Ok(group_by_four(&values))
}

fn parse_phase_function_type(reader: &LineReader, line: usize, value: &str) -> Result<PhaseFunctionType> {
    Ok(match value.trim() {
        "general" => PhaseFunctionType::General,
        "achromatic" => PhaseFunctionType::Achromatic,
        "smooth" => PhaseFunctionType::Smooth,
        other => {
            return Err(reader.error(
                line,
                format!(
                    "unknown phase function type \"{}\", expected general, achromatic, or smooth",
                    other
                ),
            ))
        }
    })
}

struct Section {
    kind: String,
    name: String,
    line: usize,
    entries: Entries,
}

fn read_section(
    reader: &mut LineReader,
    kind: &str,
    name: &str,
    header_line: usize,
) -> Result<Section> {
    if !GLSL_IDENTIFIER.is_match(name) || name.starts_with("gl_") {
        return Err(reader.error(
            header_line,
            format!("{} name \"{}\" must be a valid GLSL identifier", kind, name),
        ));
    }
    match reader.next_significant() {
        Some((_, "{")) => {}
        Some((line, _)) => return Err(reader.error(line, "expected \"{\"")),
        None => return Err(reader.error(header_line, "unexpected end of file")),
    }
    let mut entries = Entries::default();
    loop {
        let (line, text) = reader
            .next_significant()
            .ok_or_else(|| reader.error(header_line, format!("unterminated {} block", kind)))?;
        if text == "}" {
            break;
        }
        let (key, value) = reader.entry(line, text)?;
        entries.insert(reader, line, key, value)?;
    }
    Ok(Section {
        kind: kind.to_owned(),
        name: name.to_owned(),
        line: header_line,
        entries,
    })
}

pub fn parse_description(file_name: &str, text: &str) -> Result<AtmosphereParameters> {
    let mut reader = LineReader::new(file_name, text);
    let mut entries = Entries::default();
    let mut sections = Vec::new();
    let mut all_textures_are_radiance = false;
    let mut no_eclipsed_double_scattering_textures = false;

    while let Some((line, text)) = reader.next_significant() {
        if text == ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE {
            all_textures_are_radiance = true;
            continue;
        }
        if text == NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE {
            no_eclipsed_double_scattering_textures = true;
            continue;
        }
        if let Some(caps) = SECTION_HEADER.captures(text) {
            let section = read_section(&mut reader, &caps[1], &caps[2], line)?;
            if sections
                .iter()
                .any(|s: &Section| s.kind == section.kind && s.name == section.name)
            {
                return Err(reader.error(line, format!("duplicate {} \"{}\"", section.kind, section.name)));
            }
            sections.push(section);
            continue;
        }
        let (key, value) = reader.entry(line, text)?;
        entries.insert(&reader, line, key, value)?;
    }

    let eof = reader.last_line();
    let r = &reader;
    // The VZA axis is split in two halves, one for rays that hit the ground.
    let (vza_line, vza_value) = entries.take(r, "scattering texture size for vza", eof)?;
    let scattering_vza_size = parse_texture_size(r, vza_line, &vza_value, 4)?;
    if scattering_vza_size % 2 != 0 {
        return Err(r.error(vza_line, "scattering texture size for VZA must be even"));
    }
    let mut size = |key: &str, min: u32| -> Result<u32> {
        let (line, value) = entries.take(r, key, eof)?;
        parse_texture_size(r, line, &value, min)
    };
    // Every axis samples both of its ends.
    let transmittance_tex_w = size("transmittance texture size for vza", 2)?;
    let transmittance_tex_h = size("transmittance texture size for altitude", 2)?;
    let irradiance_tex_w = size("irradiance texture size for sza", 2)?;
    let irradiance_tex_h = size("irradiance texture size for altitude", 2)?;
    let scattering_texture_size = [
        scattering_vza_size,
        size("scattering texture size for dot(view,sun)", 2)?,
        size("scattering texture size for sza", 2)?,
        size("scattering texture size for altitude", 2)?,
    ];
    let eclipsed_single_scattering_texture_size = [
        size("eclipsed scattering texture size for relative azimuth", 2)?,
        size("eclipsed scattering texture size for vza", 2)?,
    ];
    let eclipsed_double_scattering_texture_size = [
        size("eclipsed double scattering texture size for relative azimuth", 2)?,
        size("eclipsed double scattering texture size for vza", 2)?,
        size("eclipsed double scattering texture size for sza", 2)?,
        size("eclipsed double scattering texture size for altitude", 2)?,
    ];

    let mut count = |key: &str, min: u32| -> Result<u32> {
        let (line, value) = entries.take(r, key, eof)?;
        let v = parse_uint(r, line, &value)?;
        if v < min {
            return Err(r.error(line, format!("\"{}\" must be at least {}", key, min)));
        }
        Ok(v)
    };
    let azimuth_pairs = count("eclipsed double scattering number of azimuth pairs to sample", 1)?;
    let elevation_pairs = count("eclipsed double scattering number of elevation pairs to sample", 1)?;
    let num_transmittance_integration_points = count("transmittance integration points", 2)?;
    let radial_integration_points = count("radial integration points", 2)?;
    let angular_integration_points = count("angular integration points", 1)?;
    let eclipse_angular_integration_points = count("angular integration points for eclipse", 2)?;
    let scattering_orders_to_compute = count("scattering orders", 2)?;

    let mut length = |key: &str| -> Result<f64> {
        let (line, value) = entries.take(r, key, eof)?;
        parse_length(r, line, &value)
    };
    let earth_radius = length("earth radius")?;
    let atmosphere_height = length("atmosphere height")?;
    let earth_sun_distance = length("earth-sun distance")?;
    let earth_moon_distance = length("earth-moon distance")?;

    let (wl_line, wl_value) = entries.take(r, "wavelengths", eof)?;
    let all_wavelengths = parse_wavelengths(r, wl_line, &wl_value)?;
    let wavelength_count = all_wavelengths.len() * POINTS_PER_WAVELENGTH_ITEM;

    let (line, value) = entries.take(r, "solar irradiance at toa", eof)?;
    let solar_irradiance_at_toa = parse_spectrum(r, line, &value, wavelength_count, parse_number)?;
    let (line, value) = entries.take(r, "ground albedo", eof)?;
    let ground_albedo = parse_spectrum(r, line, &value, wavelength_count, parse_number)?;
    entries.finish(r)?;

    let mut scatterers = Vec::new();
    let mut absorbers = Vec::new();
    for mut section in sections {
        let at = section.line;
        if section.kind == "scatterer" {
            let (line, value) = section.entries.take(r, "cross section at 1 um", at)?;
            let cross_section_at_1um = parse_area(r, line, &value)?;
            let (line, value) = section.entries.take(r, "angstrom exponent", at)?;
            let angstrom_exponent = parse_number(r, line, &value)?;
            let (_, number_density) = section.entries.take(r, "number density", at)?;
            let (_, phase_function) = section.entries.take(r, "phase function", at)?;
            let (line, value) = section.entries.take(r, "phase function type", at)?;
            let phase_function_type = parse_phase_function_type(r, line, &value)?;
            if number_density.trim().is_empty() || phase_function.trim().is_empty() {
                return Err(r.error(at, format!("scatterer \"{}\" has an empty function", section.name)));
            }
            section.entries.finish(r)?;
            scatterers.push(Scatterer {
                name: section.name,
                cross_section_at_1um,
                angstrom_exponent,
                number_density,
                phase_function,
                phase_function_type,
            });
        } else {
            let (_, number_density) = section.entries.take(r, "number density", at)?;
            let (line, value) = section.entries.take(r, "cross section", at)?;
            let absorption_cross_section =
                parse_spectrum(r, line, &value, wavelength_count, parse_area)?;
            if number_density.trim().is_empty() {
                return Err(r.error(at, format!("absorber \"{}\" has an empty function", section.name)));
            }
            section.entries.finish(r)?;
            absorbers.push(Absorber {
                name: section.name,
                number_density,
                absorption_cross_section,
            });
        }
    }
    if scatterers.is_empty() {
        return Err(r.error(eof, "at least one scatterer is required"));
    }
    let mut names = scatterers
        .iter()
        .map(|s| s.name.as_str())
        .chain(absorbers.iter().map(|a| a.name.as_str()))
        .collect::<Vec<_>>();
    names.sort_unstable();
    if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(r.error(eof, format!("species name \"{}\" is used twice", w[0])));
    }

    let mut atmo = AtmosphereParameters {
        description_file_text: text.to_owned(),
        all_wavelengths,
        solar_irradiance_at_toa,
        transmittance_tex_w,
        transmittance_tex_h,
        irradiance_tex_w,
        irradiance_tex_h,
        scattering_texture_size,
        eclipsed_single_scattering_texture_size,
        eclipsed_double_scattering_texture_size,
        eclipsed_double_scattering_number_of_azimuth_pairs_to_sample: azimuth_pairs,
        eclipsed_double_scattering_number_of_elevation_pairs_to_sample: elevation_pairs,
        scattering_orders_to_compute,
        num_transmittance_integration_points,
        radial_integration_points,
        angular_integration_points,
        eclipse_angular_integration_points,
        earth_radius,
        atmosphere_height,
        earth_sun_distance,
        earth_moon_distance,
        sun_angular_radius: 0.,
        length_of_horiz_ray_from_ground_to_border_of_atmo: 0.,
        ground_albedo,
        scatterers,
        absorbers,
        all_textures_are_radiance,
        no_eclipsed_double_scattering_textures,
    };
    atmo.update_derived();
    debug!(
        "parsed {}: {} wavelength sets, {} scatterers, {} absorbers",
        file_name,
        atmo.wavelength_set_count(),
        atmo.scatterers.len(),
        atmo.absorbers.len()
    );
    Ok(atmo)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) const EARTH: &str = include_str!("../data/earth.atmo");

    fn parse_err(text: &str) -> String {
        match parse_description("test.atmo", text) {
            Ok(_) => panic!("expected a parse failure"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_parse_earth() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        assert_eq!(atmo.wavelength_set_count(), 4);
        assert_relative_eq!(atmo.all_wavelengths[0][0], 360.);
        assert_relative_eq!(atmo.all_wavelengths[3][3], 830.);
        assert_relative_eq!(atmo.earth_radius, 6_371_000.);
        assert_relative_eq!(atmo.atmosphere_height, 120_000.);
        assert_eq!(atmo.scatterers.len(), 2);
        assert_eq!(atmo.scatterers[0].name, "rayleigh");
        assert_eq!(atmo.scatterers[0].phase_function_type, PhaseFunctionType::Smooth);
        assert_eq!(atmo.scatterers[1].phase_function_type, PhaseFunctionType::General);
        assert!(atmo.scatterers[0].number_density.contains("exp"));
        assert_eq!(atmo.absorbers.len(), 1);
        assert_eq!(atmo.absorbers[0].absorption_cross_section.len(), 4);
        assert_eq!(atmo.scat_tex_height(), atmo.scattering_texture_size[1] * atmo.scattering_texture_size[2]);
        assert!(!atmo.all_textures_are_radiance);
        Ok(())
    }

    #[test]
    fn test_derived_geometry() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let r = atmo.earth_radius;
        let h = atmo.atmosphere_height;
        assert_relative_eq!(
            atmo.length_of_horiz_ray_from_ground_to_border_of_atmo,
            ((r + h) * (r + h) - r * r).sqrt(),
            max_relative = 1e-12
        );
        // The sun is about half a degree across.
        assert_relative_eq!(atmo.sun_angular_radius.to_degrees(), 0.2667, epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn test_directives_are_recognized() -> Result<()> {
        let text = format!(
            "{}\n{}\n{}",
            ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE, NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE, EARTH
        );
        let atmo = parse_description("earth.atmo", &text)?;
        assert!(atmo.all_textures_are_radiance);
        assert!(atmo.no_eclipsed_double_scattering_textures);
        Ok(())
    }

    #[test]
    fn test_unknown_key_reports_its_line() {
        let text = format!("{}\nfrobnication level: 11\n", EARTH);
        let line = text.lines().count();
        let err = parse_err(&text);
        assert_eq!(
            err,
            format!("test.atmo:{}: unknown key \"frobnication level\"", line)
        );
    }

    #[test]
    fn test_missing_key() {
        let text = EARTH.replacen("scattering orders:", "scatering orders:", 1);
        let err = parse_err(&text);
        assert!(err.contains("missing key \"scattering orders\""), "{}", err);
    }

    #[test]
    fn test_scattering_orders_lower_bound() {
        let text = EARTH.replacen("scattering orders: 4", "scattering orders: 1", 1);
        let err = parse_err(&text);
        assert!(err.contains("must be at least 2"), "{}", err);
    }

    #[test]
    fn test_bad_wavelength_count() {
        let text = EARTH.replacen("count=16", "count=15", 1);
        let err = parse_err(&text);
        assert!(err.contains("multiple of 4"), "{}", err);
    }

    #[test]
    fn test_bad_scatterer_name() {
        let text = EARTH.replacen("scatterer \"rayleigh\"", "scatterer \"ray leigh\"", 1);
        let err = parse_err(&text);
        assert!(err.contains("valid GLSL identifier"), "{}", err);
    }

    #[test]
    fn test_texture_size_must_fit_header() {
        let text = EARTH.replacen(
            "transmittance texture size for VZA: 64",
            "transmittance texture size for VZA: 70000",
            1,
        );
        let err = parse_err(&text);
        assert!(err.contains("out of range"), "{}", err);
    }

    #[test]
    fn test_single_texel_axes_are_rejected() {
        for (from, to) in [
            ("transmittance texture size for VZA: 64", "transmittance texture size for VZA: 1"),
            ("irradiance texture size for altitude: 16", "irradiance texture size for altitude: 1"),
        ] {
            let err = parse_err(&EARTH.replacen(from, to, 1));
            assert!(err.contains("texture size 1 is out of range [2, 65535]"), "{}", err);
        }
        let err = parse_err(&EARTH.replacen(
            "transmittance texture size for VZA: 64",
            "transmittance texture size for VZA: 1",
            1,
        ));
        assert!(err.contains("test.atmo:4:"), "{}", err);
    }

    #[test]
    fn test_scattering_vza_size_must_split_evenly() {
        let text = EARTH.replacen(
            "scattering texture size for VZA: 64",
            "scattering texture size for VZA: 63",
            1,
        );
        let err = parse_err(&text);
        assert!(err.contains("test.atmo:8: scattering texture size for VZA must be even"), "{}", err);
    }

    #[test]
    fn test_unterminated_code_block() {
        let text = "scatterer \"dust\":\n{\n    number density: ```\n    return 1.;\n";
        let err = parse_err(text);
        assert!(err.contains("test.atmo:3: unterminated code block"), "{}", err);
    }

    #[test]
    fn test_spectrum_length_mismatch() {
        let text = EARTH.replacen("ground albedo: const 0.1", "ground albedo: 0.1, 0.2", 1);
        let err = parse_err(&text);
        assert!(err.contains("spectrum has 2 values"), "{}", err);
    }

    #[test]
    fn test_quantities() {
        let reader = LineReader::new("q", "");
        assert_relative_eq!(parse_length(&reader, 1, "6371 km").unwrap(), 6.371e6);
        assert_relative_eq!(parse_length(&reader, 1, "1 AU").unwrap(), ASTRONOMICAL_UNIT);
        assert_relative_eq!(parse_length(&reader, 1, "1.5e3 m").unwrap(), 1500.);
        assert!(parse_length(&reader, 1, "12").is_err());
        assert!(parse_length(&reader, 1, "12 furlongs").is_err());
        assert_relative_eq!(parse_area(&reader, 1, "2 cm^2").unwrap(), 2e-4);
        assert_relative_eq!(parse_area(&reader, 1, "1e-3 um^2").unwrap(), 1e-15);
        assert_relative_eq!(parse_wavelength(&reader, 1, "550nm").unwrap(), 550.);
    }
}
