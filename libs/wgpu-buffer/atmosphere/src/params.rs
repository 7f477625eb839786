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
use nalgebra::Vector4;
use std::fmt;

pub const ALL_TEXTURES_ARE_RADIANCES_DIRECTIVE: &str = "all textures are radiances";
pub const NO_ECLIPSED_DOUBLE_SCATTERING_TEXTURES_DIRECTIVE: &str =
    "no eclipsed double scattering textures";

/// Wavelengths are integrated four at a time, one per texel channel.
pub const POINTS_PER_WAVELENGTH_ITEM: usize = 4;

// meters
pub const SUN_RADIUS: f64 = 696_340e3;
pub const MOON_RADIUS: f64 = 1_737.4e3;

/// How the angular distribution of a scatterer lets us store its light.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhaseFunctionType {
    /// Full per-wavelength radiance is kept; the phase function is
    /// applied late, by the renderer.
    General,
    /// Phase function does not depend on wavelength; single scattering
    /// may be converted to luminance before the phase function is applied.
    Achromatic,
    /// As Achromatic, and also smooth enough that single scattering may
    /// be folded straight into the multiple scattering texture.
    Smooth,
}

impl fmt::Display for PhaseFunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Achromatic => write!(f, "achromatic"),
            Self::Smooth => write!(f, "smooth"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Scatterer {
    pub name: String,
    // m^2
    pub cross_section_at_1um: f64,
    pub angstrom_exponent: f64,
    /// GLSL function body of `float f(float altitude)`, in m^-3.
    pub number_density: String,
    /// GLSL function body of `vec4 f(float dotViewSun)`, in sr^-1.
    pub phase_function: String,
    pub phase_function_type: PhaseFunctionType,
}

impl Scatterer {
    pub fn cross_section(&self, wavelengths: &Vector4<f64>) -> Vector4<f64> {
        const REFERENCE_WAVELENGTH: f64 = 1000.; // nm
        wavelengths.map(|wl| {
            self.cross_section_at_1um * (wl / REFERENCE_WAVELENGTH).powf(-self.angstrom_exponent)
        })
    }
}

#[derive(Clone, Debug)]
pub struct Absorber {
    pub name: String,
    pub number_density: String,
    /// One group of four per wavelength set; m^2.
    pub absorption_cross_section: Vec<Vector4<f64>>,
}

impl Absorber {
    pub fn cross_section(&self, wavelength_set: usize) -> Vector4<f64> {
        self.absorption_cross_section[wavelength_set]
    }
}

/// Everything read from the atmosphere description. Lengths are meters,
/// wavelengths nanometers.
#[derive(Clone, Debug)]
pub struct AtmosphereParameters {
    pub description_file_text: String,
    pub all_wavelengths: Vec<Vector4<f64>>,
    pub solar_irradiance_at_toa: Vec<Vector4<f64>>,
    pub transmittance_tex_w: u32,
    pub transmittance_tex_h: u32,
    pub irradiance_tex_w: u32,
    pub irradiance_tex_h: u32,
    /// VZA, dot(view,sun), SZA, altitude
    pub scattering_texture_size: [u32; 4],
    /// relative azimuth, VZA
    pub eclipsed_single_scattering_texture_size: [u32; 2],
    /// relative azimuth, VZA, SZA, altitude
    pub eclipsed_double_scattering_texture_size: [u32; 4],
    pub eclipsed_double_scattering_number_of_azimuth_pairs_to_sample: u32,
    pub eclipsed_double_scattering_number_of_elevation_pairs_to_sample: u32,
    pub scattering_orders_to_compute: u32,
    pub num_transmittance_integration_points: u32,
    pub radial_integration_points: u32,
    pub angular_integration_points: u32,
    pub eclipse_angular_integration_points: u32,
    pub earth_radius: f64,
    pub atmosphere_height: f64,
    pub earth_sun_distance: f64,
    pub earth_moon_distance: f64,
    pub sun_angular_radius: f64,
    pub length_of_horiz_ray_from_ground_to_border_of_atmo: f64,
    pub ground_albedo: Vec<Vector4<f64>>,
    pub scatterers: Vec<Scatterer>,
    pub absorbers: Vec<Absorber>,
    pub all_textures_are_radiance: bool,
    pub no_eclipsed_double_scattering_textures: bool,
}

impl AtmosphereParameters {
    pub fn wavelength_set_count(&self) -> usize {
        self.all_wavelengths.len()
    }

    pub fn is_last_wavelength_set(&self, tex_index: usize) -> bool {
        tex_index + 1 == self.all_wavelengths.len()
    }

    // Keep the 4D packing in sync with texture-coordinates.glsl.
    pub fn scat_tex_width(&self) -> u32 {
        self.scattering_texture_size[0]
    }

    pub fn scat_tex_height(&self) -> u32 {
        self.scattering_texture_size[1] * self.scattering_texture_size[2]
    }

    pub fn scat_tex_depth(&self) -> u32 {
        self.scattering_texture_size[3]
    }

    /// Recompute the quantities that follow from the primary geometry.
    pub fn update_derived(&mut self) {
        self.sun_angular_radius = (SUN_RADIUS / self.earth_sun_distance).asin();
        let h = self.atmosphere_height;
        self.length_of_horiz_ray_from_ground_to_border_of_atmo =
            (h * (h + 2. * self.earth_radius)).sqrt();
    }

    /// Store every scatterer as full radiance. This is the only thing that
    /// may change a scatterer's category after parsing.
    pub fn force_radiance_output(&mut self) {
        self.all_textures_are_radiance = true;
        for scatterer in &mut self.scatterers {
            scatterer.phase_function_type = PhaseFunctionType::General;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_section_follows_angstrom_law() {
        let scatterer = Scatterer {
            name: "rayleigh".to_owned(),
            cross_section_at_1um: 2.0e-31,
            angstrom_exponent: 4.,
            number_density: "return 1.;".to_owned(),
            phase_function: "return vec4(1.);".to_owned(),
            phase_function_type: PhaseFunctionType::Smooth,
        };
        let cs = scatterer.cross_section(&Vector4::new(1000., 500., 2000., 250.));
        assert_relative_eq!(cs[0], 2.0e-31);
        assert_relative_eq!(cs[1], 2.0e-31 * 16.);
        assert_relative_eq!(cs[2], 2.0e-31 / 16.);
        assert_relative_eq!(cs[3], 2.0e-31 * 256.);
    }

    #[test]
    fn test_phase_function_type_names() {
        assert_eq!(PhaseFunctionType::General.to_string(), "general");
        assert_eq!(PhaseFunctionType::Smooth.to_string(), "smooth");
    }
}
