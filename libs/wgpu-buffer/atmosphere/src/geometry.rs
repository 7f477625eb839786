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

// Host side twins of the parameterizations in texture-coordinates.glsl.
// Both sides must stay in sync or the renderer will read garbage.
use crate::params::AtmosphereParameters;

pub fn clamp_cosine(c: f64) -> f64 {
    c.clamp(-1., 1.)
}

/// Coordinate of texel `index` of `count` along an axis where both ends
/// are sampled exactly.
pub fn unit_range_coord(index: u32, count: u32) -> f64 {
    f64::from(index) / f64::from(count - 1)
}

/// Zenith cosine of the sun at a texture coordinate: 0 is the lowest sun
/// the tables hold, 1 is the zenith.
pub fn unit_range_tex_coord_to_cos_sza(atmo: &AtmosphereParameters, tex_coord: f64) -> f64 {
    let dist_min = atmo.atmosphere_height;
    let dist_max = atmo.length_of_horiz_ray_from_ground_to_border_of_atmo;
    let big_a = atmo.earth_radius / (dist_max - dist_min);
    let a = (big_a - big_a * tex_coord) / (1. + big_a * tex_coord);
    let dist = dist_min + a.min(big_a) * (dist_max - dist_min);
    if dist == 0. {
        return 1.;
    }
    let h = atmo.length_of_horiz_ray_from_ground_to_border_of_atmo;
    clamp_cosine((h * h - dist * dist) / (2. * atmo.earth_radius * dist))
}

/// Altitude encoded by distance to the horizon, as the scattering
/// textures do it.
pub fn altitude_from_unit_range(atmo: &AtmosphereParameters, coord: f64) -> f64 {
    let dist_to_horizon = coord * atmo.length_of_horiz_ray_from_ground_to_border_of_atmo;
    let r = atmo.earth_radius;
    (dist_to_horizon * dist_to_horizon + r * r).sqrt() - r
}

/// Camera altitude for an eclipsed double scattering sample. Rounding may
/// push the top sample past the atmosphere, and exact zeros break log
/// interpolation in the renderer, so keep a meter away from both ends.
/// The top bound wins for atmospheres too thin to have both.
pub fn eclipse_camera_altitude(atmo: &AtmosphereParameters, alt_index: u32, count: u32) -> f64 {
    let altitude = altitude_from_unit_range(atmo, unit_range_coord(alt_index, count));
    altitude.max(1.).min(atmo.atmosphere_height - 1.)
}
