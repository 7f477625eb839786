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
use atmosphere::{
    exit_code_for, parse_description_file, DebugOutputs, Precompute, PrecomputeOptions,
    REQUIRED_FEATURES,
};
use gpu::{Gpu, GpuOpts};
use log::{error, info};
use std::{path::PathBuf, process};
use structopt::StructOpt;

/// Precompute atmospheric scattering tables and renderer programs
#[derive(Debug, StructOpt)]
#[structopt(name = "calc-sky-tables")]
struct Opt {
    /// Atmosphere description file
    #[structopt(parse(from_os_str))]
    description: PathBuf,

    /// Directory to write tables and programs into
    #[structopt(short, long = "out-dir", parse(from_os_str))]
    out_dir: Option<PathBuf>,

    /// Save multiple scattering as radiance per wavelength set instead of
    /// luminance summed over them
    #[structopt(long)]
    radiance: bool,

    /// Save ground irradiance after every scattering order
    #[structopt(long)]
    save_ground_irradiance: bool,

    /// Save scattering density of every order
    #[structopt(long)]
    save_scat_density: bool,

    /// Save order 2 scattering density due to light from the ground
    #[structopt(long = "save-scat-density2-from-ground")]
    save_scat_density_order2_from_ground: bool,

    /// Save delta scattering of every order
    #[structopt(long)]
    save_delta_scattering: bool,

    /// Save multiple scattering as accumulated after every order
    #[structopt(long)]
    save_accum_scattering: bool,

    /// Skip the 4D passes; for checking the shaders quickly
    #[structopt(long)]
    no_save_textures: bool,

    /// Skip computing eclipsed double scattering
    #[structopt(long = "no-eds-textures")]
    no_eds_textures: bool,

    #[structopt(flatten)]
    gpu_opts: GpuOpts,
}

impl Opt {
    fn debug_outputs(&self) -> DebugOutputs {
        let mut debug = DebugOutputs::empty();
        let flags = [
            (self.save_ground_irradiance, DebugOutputs::SAVE_GROUND_IRRADIANCE),
            (self.save_scat_density, DebugOutputs::SAVE_SCAT_DENSITY),
            (
                self.save_scat_density_order2_from_ground,
                DebugOutputs::SAVE_SCAT_DENSITY_ORDER2_FROM_GROUND,
            ),
            (self.save_delta_scattering, DebugOutputs::SAVE_DELTA_SCATTERING),
            (self.save_accum_scattering, DebugOutputs::SAVE_ACCUM_SCATTERING),
            (self.no_save_textures, DebugOutputs::NO_SAVE_TEXTURES),
            (self.no_eds_textures, DebugOutputs::NO_EDS_TEXTURES),
        ];
        for (enabled, flag) in flags {
            debug.set(flag, enabled);
        }
        debug
    }
}

fn run(opt: Opt) -> Result<()> {
    let atmo = parse_description_file(&opt.description)?;
    let out_dir = opt.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let options = PrecomputeOptions::new(out_dir)
        .with_radiance(opt.radiance)
        .with_debug(opt.debug_outputs());
    let precompute = Precompute::new(atmo, options);

    let gpu = Gpu::headless(&opt.gpu_opts, REQUIRED_FEATURES)?;
    let adapter = gpu.adapter_info();
    info!("using {} ({:?})", adapter.name, adapter.backend);
    precompute.run(&gpu)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run(Opt::from_args()) {
        let code = exit_code_for(&err);
        if code == 111 {
            error!("Fatal error: {:#}", err);
        } else {
            error!("{:#}", err);
        }
        process::exit(code);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_debug_switches() {
        let opt = Opt::from_iter(&[
            "calc-sky-tables",
            "earth.atmo",
            "--out-dir",
            "out",
            "--save-scat-density2-from-ground",
            "--no-eds-textures",
        ]);
        assert_eq!(opt.out_dir, Some(PathBuf::from("out")));
        let debug = opt.debug_outputs();
        assert!(debug.contains(DebugOutputs::SAVE_SCAT_DENSITY_ORDER2_FROM_GROUND));
        assert!(debug.contains(DebugOutputs::NO_EDS_TEXTURES));
        assert!(!debug.contains(DebugOutputs::NO_SAVE_TEXTURES));
        assert!(!opt.radiance);
    }

    #[test]
    fn test_adapter_flag_is_accepted() {
        let opt = Opt::from_iter(&["calc-sky-tables", "earth.atmo", "--adapter", "fallback"]);
        assert_eq!(opt.gpu_opts.adapter(), gpu::AdapterPreference::Fallback);
    }
}
