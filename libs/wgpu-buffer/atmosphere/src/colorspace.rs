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
use crate::params::{AtmosphereParameters, POINTS_PER_WAVELENGTH_ITEM};
use nalgebra::{Matrix4, Vector4};

// lm/W, photopic and scotopic
const MAX_PHOTOPIC_EFFICACY: f64 = 683.002;
const MAX_SCOTOPIC_EFFICACY: f64 = 1700.13;

fn piecewise_gaussian(x: f64, mean: f64, sigma_lo: f64, sigma_hi: f64) -> f64 {
    let sigma = if x < mean { sigma_lo } else { sigma_hi };
    let t = (x - mean) / sigma;
    (-0.5 * t * t).exp()
}

/// CIE 1931 2° color matching functions in XYZ, with the CIE 1951
/// scotopic luminous efficiency in W. Analytic multi-lobe fit of
/// Wyman, Sloan & Shirley (2013); wavelength in nm.
pub fn wavelength_to_xyzw(wavelength: f64) -> Vector4<f64> {
    let wl = wavelength;
    let x = 1.056 * piecewise_gaussian(wl, 599.8, 37.9, 31.0)
        + 0.362 * piecewise_gaussian(wl, 442.0, 16.0, 26.7)
        - 0.065 * piecewise_gaussian(wl, 501.1, 20.4, 26.2);
    let y = 0.821 * piecewise_gaussian(wl, 568.8, 46.9, 40.5)
        + 0.286 * piecewise_gaussian(wl, 530.9, 16.3, 31.1);
    let z = 1.217 * piecewise_gaussian(wl, 437.0, 11.8, 36.0)
        + 0.681 * piecewise_gaussian(wl, 459.0, 26.0, 13.8);
    let um = wl / 1000.;
    let w = 1.019 * (-285.4 * (um - 0.5) * (um - 0.5)).exp();
    Vector4::new(x, y, z, w)
}

/// Maps the four radiances of one wavelength set to its share of XYZW
/// luminance. Summing the products over every set integrates the color
/// matching functions over the whole spectrum with the trapezoid rule.
pub fn radiance_to_luminance(atmo: &AtmosphereParameters, tex_index: usize) -> Matrix4<f64> {
    let wl_count = atmo.all_wavelengths.len() * POINTS_PER_WAVELENGTH_ITEM;
    let weights = if wl_count == POINTS_PER_WAVELENGTH_ITEM {
        Vector4::new(0.5, 1., 1., 0.5)
    } else if tex_index == 0 {
        Vector4::new(0.5, 1., 1., 1.)
    } else if atmo.is_last_wavelength_set(tex_index) {
        Vector4::new(1., 1., 1., 0.5)
    } else {
        Vector4::new(1., 1., 1., 1.)
    };
    let first = atmo.all_wavelengths[0][0];
    let last = atmo.all_wavelengths[atmo.all_wavelengths.len() - 1][3];
    let dlambda = Matrix4::from_diagonal(&weights) * ((last - first).abs() / (wl_count as f64 - 1.));
    let efficacy = Matrix4::from_diagonal(&Vector4::new(
        MAX_PHOTOPIC_EFFICACY,
        MAX_PHOTOPIC_EFFICACY,
        MAX_PHOTOPIC_EFFICACY,
        MAX_SCOTOPIC_EFFICACY,
    ));
    let wavelengths = &atmo.all_wavelengths[tex_index];
    let cmf = Matrix4::from_columns(&[
        wavelength_to_xyzw(wavelengths[0]),
        wavelength_to_xyzw(wavelengths[1]),
        wavelength_to_xyzw(wavelengths[2]),
        wavelength_to_xyzw(wavelengths[3]),
    ]);
    efficacy * cmf * dlambda
}

/// Column-major f32 layout, as a GLSL mat4 expects.
pub fn matrix_to_std140(m: &Matrix4<f64>) -> [[f32; 4]; 4] {
    let mut out = [[0f32; 4]; 4];
    for (c, column) in out.iter_mut().enumerate() {
        for (r, v) in column.iter_mut().enumerate() {
            *v = m[(r, c)] as f32;
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::{parse_description, test::EARTH};
    use anyhow::Result;
    use approx::assert_relative_eq;

    #[test]
    fn test_color_matching_peaks() {
        let green = wavelength_to_xyzw(555.);
        assert_relative_eq!(green[1], 1., epsilon = 0.03);
        let scotopic = wavelength_to_xyzw(507.);
        assert_relative_eq!(scotopic[3], 1., epsilon = 0.02);
        // Deep infrared is invisible.
        let ir = wavelength_to_xyzw(900.);
        assert!(ir[0] < 1e-3 && ir[1] < 1e-3 && ir[2] < 1e-3);
    }

    #[test]
    fn test_trapezoid_weights() -> Result<()> {
        let atmo = parse_description("earth.atmo", EARTH)?;
        let n = atmo.wavelength_set_count();
        let dl = (atmo.all_wavelengths[n - 1][3] - atmo.all_wavelengths[0][0]) / 15.;

        let first = radiance_to_luminance(&atmo, 0);
        let wl0 = wavelength_to_xyzw(atmo.all_wavelengths[0][0]);
        let wl1 = wavelength_to_xyzw(atmo.all_wavelengths[0][1]);
        assert_relative_eq!(first[(1, 0)], 683.002 * wl0[1] * 0.5 * dl, max_relative = 1e-12);
        assert_relative_eq!(first[(1, 1)], 683.002 * wl1[1] * dl, max_relative = 1e-12);
        assert_relative_eq!(first[(3, 1)], 1700.13 * wl1[3] * dl, max_relative = 1e-12);

        let last = radiance_to_luminance(&atmo, n - 1);
        let wl3 = wavelength_to_xyzw(atmo.all_wavelengths[n - 1][3]);
        assert_relative_eq!(last[(1, 3)], 683.002 * wl3[1] * 0.5 * dl, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn test_single_set_halves_both_ends() -> Result<()> {
        let mut atmo = parse_description("earth.atmo", EARTH)?;
        atmo.all_wavelengths.truncate(1);
        let m = radiance_to_luminance(&atmo, 0);
        let dl = (atmo.all_wavelengths[0][3] - atmo.all_wavelengths[0][0]) / 3.;
        for (col, weight) in [0.5, 1., 1., 0.5].iter().enumerate() {
            let cmf = wavelength_to_xyzw(atmo.all_wavelengths[0][col]);
            assert_relative_eq!(m[(0, col)], 683.002 * cmf[0] * weight * dl, max_relative = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_std140_is_column_major() {
        let m = Matrix4::new(
            1., 2., 3., 4., //
            5., 6., 7., 8., //
            9., 10., 11., 12., //
            13., 14., 15., 16.,
        );
        let out = matrix_to_std140(&m);
        assert_eq!(out[0], [1., 5., 9., 13.]);
        assert_eq!(out[3], [4., 8., 12., 16.]);
    }
}
