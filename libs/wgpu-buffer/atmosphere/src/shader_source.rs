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

//! Composition of GLSL programs from the embedded templates.
//!
//! Templates never branch on configuration at run time. Instead every
//! compile states a complete `Specialization` that is substituted into the
//! template text, and the per wavelength set headers (constants, density
//! and phase functions, transmittance quadrature) are generated from the
//! atmosphere description into a `SourceOverlay` that shadows the
//! template registry.
use crate::{
    colorspace::{matrix_to_std140, radiance_to_luminance},
    error::Error,
    params::{AtmosphereParameters, Scatterer, MOON_RADIUS},
};
use anyhow::Result;
use fxhash::FxHashMap;
use nalgebra::Vector4;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::{collections::BTreeMap, fmt::Write};

pub const CONST_HEADER: &str = "const.h.glsl";
pub const RADIANCE_TO_LUMINANCE_HEADER: &str = "radiance-to-luminance.h.glsl";
pub const DENSITIES: &str = "densities.glsl";
pub const PHASE_FUNCTIONS: &str = "phase-functions.glsl";
pub const TRANSMITTANCE_FUNCTIONS: &str = "transmittance-functions.glsl";
pub const TOTAL_SCATTERING_COEFFICIENT: &str = "total-scattering-coefficient.glsl";
pub const CURRENT_SCATTERER: &str = "current-scatterer.glsl";
/// Supplied by the renderer; ours only exists so the program compiles.
pub const CALC_VIEW_DIR_STUB: &str = "calc-view-dir.frag";

pub const TOTAL_SCATTERING_COEFFICIENT_PLACEHOLDER: &str = "COMPUTE_TOTAL_SCATTERING_COEFFICIENT;";

macro_rules! templates {
    ($($name:literal),* $(,)?) => {
        [$(($name, include_str!(concat!("shaders/", $name)))),*]
    };
}

static TEMPLATES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    templates![
        "common-functions.glsl",
        "texture-coordinates.glsl",
        "pass-parameters.glsl",
        "transmittance-sampling.glsl",
        "irradiance-sampling.glsl",
        "scattering-sampling.glsl",
        "single-scattering.glsl",
        "eclipse-geometry.glsl",
        "single-scattering-eclipsed.glsl",
        "double-scattering-eclipsed.glsl",
        "compute-transmittance.comp",
        "compute-direct-irradiance.comp",
        "compute-single-scattering.comp",
        "compute-scattering-density.comp",
        "compute-indirect-irradiance.comp",
        "compute-multiple-scattering.comp",
        "copy-scattering-texture.comp",
        "merge-smooth-single-scattering-texture.comp",
        "compute-eclipsed-double-scattering.comp",
        "compute-eclipsed-single-scattering.comp",
        "render.frag",
    ]
    .into_iter()
    .collect()
});

static INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*#include[ \t]+"([^"]+)""#).expect("static regex"));

pub fn template(name: &str) -> Result<&'static str> {
    TEMPLATES
        .get(name)
        .copied()
        .ok_or_else(|| Error::Config(format!("no shader template named \"{}\"", name)).into())
}

/// Names of the files `source` includes, in order of appearance.
pub fn includes_of(source: &str) -> impl Iterator<Item = &str> {
    INCLUDE
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Replace `word` wherever it stands as a whole identifier.
pub fn substitute_word(src: &str, word: &str, replacement: &str) -> String {
    let pattern = format!(r"\b{}\b", regex::escape(word));
    Regex::new(&pattern)
        .expect("escaped word is a valid regex")
        .replace_all(src, NoExpand(replacement))
        .into_owned()
}

/// Every render switch a renderer-facing program tests. Exactly the ones a
/// variant names are set to 1, the rest to 0.
pub const RENDER_MODE_MACROS: [&str; 13] = [
    "RENDERING_ANY_ZERO_SCATTERING",
    "RENDERING_ZERO_SCATTERING",
    "RENDERING_ECLIPSED_ZERO_SCATTERING",
    "RENDERING_ANY_SINGLE_SCATTERING",
    "RENDERING_SINGLE_SCATTERING_ON_THE_FLY",
    "RENDERING_SINGLE_SCATTERING_PRECOMPUTED_RADIANCE",
    "RENDERING_SINGLE_SCATTERING_PRECOMPUTED_LUMINANCE",
    "RENDERING_ECLIPSED_SINGLE_SCATTERING_ON_THE_FLY",
    "RENDERING_ECLIPSED_SINGLE_SCATTERING_PRECOMPUTED_RADIANCE",
    "RENDERING_ECLIPSED_SINGLE_SCATTERING_PRECOMPUTED_LUMINANCE",
    "RENDERING_ECLIPSED_DOUBLE_SCATTERING_PRECOMPUTED_RADIANCE",
    "RENDERING_MULTIPLE_SCATTERING_RADIANCE",
    "RENDERING_MULTIPLE_SCATTERING_LUMINANCE",
];

/// The full set of substitutions made into the templates of one program.
/// Switches that a template tests but the compile does not mention are
/// set to 0, so no template is ever left holding a bare macro name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Specialization {
    values: BTreeMap<&'static str, String>,
    total_scattering_coefficient: Option<String>,
}

const SWITCHES: [&str; 8] = [
    "RADIATION_IS_FROM_GROUND_ONLY",
    "BLEND_WITH_TARGET",
    "BLEND_DELTA_IRRADIANCE",
    "BLEND_ACCUMULATED_IRRADIANCE",
    "CONVERT_TO_LUMINANCE",
    "COMPUTE_RADIANCE",
    "COMPUTE_LUMINANCE",
    "ALL_SCATTERERS_AT_ONCE_WITH_PHASE_FUNCTION",
];

impl Default for Specialization {
    fn default() -> Self {
        Self::new()
    }
}

impl Specialization {
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        for name in SWITCHES.iter().chain(RENDER_MODE_MACROS.iter()) {
            values.insert(*name, "0".to_owned());
        }
        values.insert("SCATTERING_ORDER", "0".to_owned());
        Self {
            values,
            total_scattering_coefficient: None,
        }
    }

    pub fn flag(mut self, name: &'static str, enabled: bool) -> Self {
        self.values
            .insert(name, if enabled { "1" } else { "0" }.to_owned());
        self
    }

    pub fn scattering_order(mut self, order: u32) -> Self {
        self.values.insert("SCATTERING_ORDER", order.to_string());
        self
    }

    /// Turn on the named render switches.
    pub fn render_mode(mut self, macros: &[&'static str]) -> Self {
        for name in macros {
            self = self.flag(name, true);
        }
        self
    }

    /// Fill the total scattering coefficient placeholder with statements
    /// that sum every scatterer.
    pub fn total_scattering_coefficient(mut self, statements: String) -> Self {
        self.total_scattering_coefficient = Some(statements);
        self
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = match &self.total_scattering_coefficient {
            Some(statements) => text.replace(TOTAL_SCATTERING_COEFFICIENT_PLACEHOLDER, statements),
            None => text.to_owned(),
        };
        for (name, value) in &self.values {
            if out.contains(name) {
                out = substitute_word(&out, name, value);
            }
        }
        out
    }
}

/// Logical file name to generated text. Never changed in place: deriving
/// a new overlay leaves the one it came from as it was.
#[derive(Clone, Debug, Default)]
pub struct SourceOverlay {
    files: BTreeMap<String, String>,
}

impl SourceOverlay {
    pub fn with(&self, name: &str, text: impl Into<String>) -> Self {
        let mut files = self.files.clone();
        files.insert(name.to_owned(), text.into());
        Self { files }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// Walk the includes of `entry` and put the specialized text of every
/// template it reaches into a new overlay on top of `base`. Files already
/// in `base` are generated per compile and used as they are.
pub fn specialize(base: &SourceOverlay, spec: &Specialization, entry: &str) -> Result<SourceOverlay> {
    let mut files = base.files.clone();
    let mut pending = vec![entry.to_owned()];
    let mut seen = Vec::new();
    while let Some(name) = pending.pop() {
        if seen.contains(&name) {
            continue;
        }
        if !files.contains_key(&name) {
            let text = spec.apply(template(&name)?);
            files.insert(name.clone(), text);
        }
        if let Some(text) = files.get(&name) {
            pending.extend(includes_of(text).map(|s| s.to_owned()));
        }
        seen.push(name);
    }
    Ok(SourceOverlay { files })
}

/// Format a float so GLSL reads it as a float literal.
pub fn glsl_float(v: f64) -> String {
    let s = format!("{:?}", v as f32);
    if s.contains('.') || s.contains("inf") || s.contains("NaN") {
        return s;
    }
    match s.find('e') {
        Some(pos) => format!("{}.0{}", &s[..pos], &s[pos..]),
        None => format!("{}.0", s),
    }
}

fn glsl_vec4(v: &Vector4<f64>) -> String {
    format!(
        "vec4({},{},{},{})",
        glsl_float(v[0]),
        glsl_float(v[1]),
        glsl_float(v[2]),
        glsl_float(v[3])
    )
}

/// Headers shared by every program of wavelength set `tex_index`. The
/// current scatterer starts out as the stub.
pub fn base_overlay(atmo: &AtmosphereParameters, tex_index: usize) -> Result<SourceOverlay> {
    Ok(SourceOverlay::default()
        .with(CONST_HEADER, const_header(atmo, tex_index)?)
        .with(RADIANCE_TO_LUMINANCE_HEADER, radiance_to_luminance_header(atmo, tex_index))
        .with(DENSITIES, densities(atmo, tex_index))
        .with(PHASE_FUNCTIONS, phase_functions(atmo))
        .with(TRANSMITTANCE_FUNCTIONS, transmittance_functions(atmo))
        .with(TOTAL_SCATTERING_COEFFICIENT, total_scattering_coefficient(atmo))
        .with(CURRENT_SCATTERER, current_scatterer_stub())
        .with(CALC_VIEW_DIR_STUB, "vec3 calcViewDir()\n{\n    return vec3(0.0);\n}\n"))
}

fn const_header(atmo: &AtmosphereParameters, tex_index: usize) -> Result<String> {
    let mut s = String::new();
    let [sv, sd, ss, sa] = atmo.scattering_texture_size;
    let [ea, ev] = atmo.eclipsed_single_scattering_texture_size;
    let [da, dv, ds, dl] = atmo.eclipsed_double_scattering_texture_size;
    let floats = [
        ("earthRadius", atmo.earth_radius),
        ("atmosphereHeight", atmo.atmosphere_height),
        (
            "lengthOfHorizRayFromGroundToBorderOfAtmo",
            atmo.length_of_horiz_ray_from_ground_to_border_of_atmo,
        ),
        ("sunAngularRadius", atmo.sun_angular_radius),
        ("earthSunDistance", atmo.earth_sun_distance),
        ("earthMoonDistance", atmo.earth_moon_distance),
        ("moonRadius", MOON_RADIUS),
    ];
    let ints = [
        ("transmittanceTexW", atmo.transmittance_tex_w),
        ("transmittanceTexH", atmo.transmittance_tex_h),
        ("irradianceTexW", atmo.irradiance_tex_w),
        ("irradianceTexH", atmo.irradiance_tex_h),
        (
            "eclipsedDoubleScatteringNumberOfAzimuthPairsToSample",
            atmo.eclipsed_double_scattering_number_of_azimuth_pairs_to_sample,
        ),
        (
            "eclipsedDoubleScatteringNumberOfElevationPairsToSample",
            atmo.eclipsed_double_scattering_number_of_elevation_pairs_to_sample,
        ),
        (
            "numTransmittanceIntegrationPoints",
            atmo.num_transmittance_integration_points,
        ),
        ("radialIntegrationPoints", atmo.radial_integration_points),
        ("angularIntegrationPoints", atmo.angular_integration_points),
        (
            "eclipseAngularIntegrationPoints",
            atmo.eclipse_angular_integration_points,
        ),
    ];
    writeln!(s, "const float PI=3.14159265358979;")?;
    for (name, v) in floats {
        writeln!(s, "const float {}={};", name, glsl_float(v))?;
    }
    for (name, v) in ints {
        writeln!(s, "const int {}={};", name, v)?;
    }
    writeln!(
        s,
        "const ivec4 scatteringTextureSize=ivec4({},{},{},{});",
        sv, sd, ss, sa
    )?;
    writeln!(
        s,
        "const ivec2 eclipsedSingleScatteringTextureSize=ivec2({},{});",
        ea, ev
    )?;
    writeln!(
        s,
        "const ivec4 eclipsedDoubleScatteringTextureSize=ivec4({},{},{},{});",
        da, dv, ds, dl
    )?;
    writeln!(s, "const vec4 wavelengths={};", glsl_vec4(&atmo.all_wavelengths[tex_index]))?;
    writeln!(
        s,
        "const vec4 solarIrradianceAtTOA={};",
        glsl_vec4(&atmo.solar_irradiance_at_toa[tex_index])
    )?;
    writeln!(s, "const vec4 groundAlbedo={};", glsl_vec4(&atmo.ground_albedo[tex_index]))?;
    Ok(s)
}

fn radiance_to_luminance_header(atmo: &AtmosphereParameters, tex_index: usize) -> String {
    let columns = matrix_to_std140(&radiance_to_luminance(atmo, tex_index));
    let values = columns
        .iter()
        .flatten()
        .map(|v| glsl_float(f64::from(*v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("const mat4 radianceToLuminance=mat4({});\n", values)
}

fn densities(atmo: &AtmosphereParameters, tex_index: usize) -> String {
    let wavelengths = &atmo.all_wavelengths[tex_index];
    let mut s = format!("#include \"{}\"\n", CONST_HEADER);
    for scatterer in &atmo.scatterers {
        s += &format!(
            "float scattererNumberDensity_{}(float altitude)\n{{\n{}\n}}\n",
            scatterer.name, scatterer.number_density
        );
        s += &format!(
            "const vec4 scatteringCrossSection_{}={};\n",
            scatterer.name,
            glsl_vec4(&scatterer.cross_section(wavelengths))
        );
    }
    for absorber in &atmo.absorbers {
        s += &format!(
            "float absorberNumberDensity_{}(float altitude)\n{{\n{}\n}}\n",
            absorber.name, absorber.number_density
        );
        s += &format!(
            "const vec4 absorptionCrossSection_{}={};\n",
            absorber.name,
            glsl_vec4(&absorber.cross_section(tex_index))
        );
    }
    s
}

fn phase_functions(atmo: &AtmosphereParameters) -> String {
    let mut s = format!("#include \"{}\"\n", CONST_HEADER);
    for scatterer in &atmo.scatterers {
        s += &format!(
            "vec4 phaseFunction_{}(float dotViewSun)\n{{\n{}\n}}\n",
            scatterer.name, scatterer.phase_function
        );
    }
    s
}

fn transmittance_functions(atmo: &AtmosphereParameters) -> String {
    let mut s = format!(
        "#include \"{}\"\n#include \"{}\"\n#include \"common-functions.glsl\"\n",
        CONST_HEADER, DENSITIES
    );
    let species = atmo
        .scatterers
        .iter()
        .map(|sc| (sc.name.as_str(), "scattererNumberDensity", "scatteringCrossSection"))
        .chain(
            atmo.absorbers
                .iter()
                .map(|ab| (ab.name.as_str(), "absorberNumberDensity", "absorptionCrossSection")),
        )
        .collect::<Vec<_>>();
    for (name, density, _) in &species {
        s += &format!(
            r#"float opticalLength_{name}(float cosZenith, float altitude)
{{
    float dist=distanceToAtmosphereBorder(cosZenith, altitude);
    float dl=dist/float(numTransmittanceIntegrationPoints-1);
    float sum=0.0;
    for(int n=0; n<numTransmittanceIntegrationPoints; ++n)
        sum += trapezoidWeight(n, numTransmittanceIntegrationPoints)*{density}_{name}(altitudeAtDistance(float(n)*dl, cosZenith, altitude));
    return sum*dl;
}}
"#,
            name = name,
            density = density
        );
    }
    let depth = species
        .iter()
        .map(|(name, _, cross_section)| {
            format!(
                "opticalLength_{name}(cosZenith, altitude)*{cs}_{name}",
                name = name,
                cs = cross_section
            )
        })
        .collect::<Vec<_>>()
        .join("\n                 +");
    s += &format!(
        "vec4 computeTransmittanceToAtmosphereBorder(float cosZenith, float altitude)\n{{\n    return exp(-({}));\n}}\n",
        depth
    );
    s
}

fn total_scattering_coefficient(atmo: &AtmosphereParameters) -> String {
    let mut s = format!(
        "#include \"{}\"\n#include \"{}\"\n#include \"{}\"\n",
        CONST_HEADER, DENSITIES, PHASE_FUNCTIONS
    );
    s += "vec4 totalScatteringCoefficient(float altitude, float dotViewInc)\n{\n    vec4 coefficient=vec4(0.0);\n";
    for scatterer in &atmo.scatterers {
        s += &format!(
            "    coefficient += scattererNumberDensity_{n}(altitude)*scatteringCrossSection_{n}*phaseFunction_{n}(dotViewInc);\n",
            n = scatterer.name
        );
    }
    s += "    return coefficient;\n}\n";
    s
}

/// Statements that replace the total scattering coefficient placeholder in
/// the eclipsed programs, leaving the sum in `scatCoef`.
pub fn total_scattering_coefficient_statement(atmo: &AtmosphereParameters) -> String {
    let mut s = "vec4 scatCoef=vec4(0.0);\n".to_owned();
    for scatterer in &atmo.scatterers {
        s += &format!(
            "    scatCoef += scattererNumberDensity_{n}(altAtDist)*scatteringCrossSection_{n}*phaseFunction_{n}(dotViewSun);\n",
            n = scatterer.name
        );
    }
    s
}

/// Functions of the scatterer a program is specialized for.
pub fn current_scatterer(
    atmo: &AtmosphereParameters,
    scatterer: &Scatterer,
    tex_index: usize,
) -> String {
    format!(
        r#"#include "{header}"
float scattererDensity(float altitude)
{{
{density}
}}
vec4 scatteringCrossSection()
{{
    return {cross_section};
}}
vec4 currentPhaseFunction(float dotViewSun)
{{
{phase}
}}
"#,
        header = CONST_HEADER,
        density = scatterer.number_density,
        cross_section = glsl_vec4(&scatterer.cross_section(&atmo.all_wavelengths[tex_index])),
        phase = scatterer.phase_function
    )
}

/// Stands in for the current scatterer in programs that have none. The
/// phase function poisons the result if one is used by mistake.
pub fn current_scatterer_stub() -> String {
    r#"float scattererDensity(float altitude)
{
    return 0.0;
}
vec4 scatteringCrossSection()
{
    return vec4(0.0);
}
vec4 currentPhaseFunction(float dotViewSun)
{
    return vec4(3.4028235e38);
}
"#
    .to_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::{parse_description, test::EARTH};

    #[test]
    fn test_substitute_whole_words_only() {
        let src = "#if BLEND\nBLENDED BLEND_WITH_TARGET x=BLEND;";
        assert_eq!(
            substitute_word(src, "BLEND", "1"),
            "#if 1\nBLENDED BLEND_WITH_TARGET x=1;"
        );
        assert_eq!(substitute_word("a.b a+b", "a.b", "c"), "c a+b");
        assert_eq!(substitute_word("x xy", "x", "$0"), "$0 xy");
    }

    #[test]
    fn test_glsl_float() {
        assert_eq!(glsl_float(1.), "1.0");
        assert_eq!(glsl_float(0.5), "0.5");
        assert_eq!(glsl_float(6371000.), "6371000.0");
        assert_eq!(glsl_float(4.1e-32), "4.1e-32");
        assert_eq!(glsl_float(1e30), "1.0e30");
        assert_eq!(glsl_float(-2.), "-2.0");
    }

    #[test]
    fn test_missing_template_is_config_error() {
        let err = template("no-such-file.glsl").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }

    #[test]
    fn test_every_template_include_resolves() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let base = base_overlay(&atmo, 0)?;
        for (name, text) in TEMPLATES.iter() {
            for include in includes_of(text) {
                assert!(
                    base.contains(include) || TEMPLATES.contains_key(include),
                    "{} includes unknown {}",
                    name,
                    include
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_specialize_fills_every_switch() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let base = base_overlay(&atmo, 1)?;
        let spec = Specialization::new()
            .scattering_order(3)
            .flag("BLEND_WITH_TARGET", true);
        let overlay = specialize(&base, &spec, "compute-scattering-density.comp")?;
        let entry = overlay.get("compute-scattering-density.comp").unwrap_or_default();
        assert!(entry.contains("#if 0 == 0"));
        assert!(entry.contains("#if 3 == 2"));
        assert!(entry.contains("#if 1\n"));
        assert!(!entry.contains("SCATTERING_ORDER"));
        assert!(!entry.contains("RADIATION_IS_FROM_GROUND_ONLY"));
        // Reached through includes.
        assert!(overlay.contains("texture-coordinates.glsl"));
        assert!(overlay.contains("scattering-sampling.glsl"));
        // The base is untouched.
        assert!(!base.contains("compute-scattering-density.comp"));
        Ok(())
    }

    #[test]
    fn test_total_scattering_placeholder() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let base = base_overlay(&atmo, 0)?;
        let spec = Specialization::new()
            .flag("ALL_SCATTERERS_AT_ONCE_WITH_PHASE_FUNCTION", true)
            .total_scattering_coefficient(total_scattering_coefficient_statement(&atmo));
        let overlay = specialize(&base, &spec, "compute-eclipsed-double-scattering.comp")?;
        let eclipsed = overlay.get("single-scattering-eclipsed.glsl").unwrap_or_default();
        assert!(!eclipsed.contains(TOTAL_SCATTERING_COEFFICIENT_PLACEHOLDER));
        assert!(eclipsed.contains("phaseFunction_rayleigh(dotViewSun)"));
        assert!(eclipsed.contains("phaseFunction_mie(dotViewSun)"));
        Ok(())
    }

    #[test]
    fn test_const_header_follows_wavelength_set() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let first = const_header(&atmo, 0)?;
        let last = const_header(&atmo, 3)?;
        assert!(first.contains("const float earthRadius=6371000.0;"));
        assert!(first.contains("const ivec4 scatteringTextureSize=ivec4(64,16,32,16);"));
        assert!(first.contains("const vec4 wavelengths=vec4(360.0,"));
        assert!(last.contains(",830.0);"));
        Ok(())
    }

    #[test]
    fn test_generated_functions_name_every_species() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let transmittance = transmittance_functions(&atmo);
        assert!(transmittance.contains("opticalLength_rayleigh(cosZenith, altitude)*scatteringCrossSection_rayleigh"));
        assert!(transmittance.contains("opticalLength_ozone(cosZenith, altitude)*absorptionCrossSection_ozone"));
        let current = current_scatterer(&atmo, &atmo.scatterers[1], 2);
        assert!(current.contains("float g = 0.76;"));
        assert!(current.contains("vec4 scatteringCrossSection()"));
        Ok(())
    }
}
