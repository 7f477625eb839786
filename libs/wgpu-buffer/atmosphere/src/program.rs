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
    shader_source::{includes_of, template, SourceOverlay, CALC_VIEW_DIR_STUB},
};
use anyhow::Result;
use fxhash::FxHashMap;
use gpu::{naga, Gpu};
use log::{debug, trace};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgramStage {
    Compute,
    Fragment,
}

impl ProgramStage {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            Self::Compute => naga::ShaderStage::Compute,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// One source unit as it went into a program: logical name and text, with
/// its include lines still in place.
pub type SourceUnit = (String, String);

#[derive(Clone, Debug)]
pub struct ResolvedProgram {
    pub name: String,
    pub source: String,
    pub units: Vec<SourceUnit>,
}

fn lookup(name: &str, overlay: &SourceOverlay) -> Result<String> {
    if let Some(text) = overlay.get(name) {
        return Ok(text.to_owned());
    }
    Ok(template(name)?.to_owned())
}

fn expand(name: &str, overlay: &SourceOverlay, units: &mut Vec<SourceUnit>) -> Result<String> {
    let text = lookup(name, overlay)?;
    units.push((name.to_owned(), text.clone()));
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match includes_of(line).next() {
            Some(include) => {
                if !units.iter().any(|(n, _)| n == include) {
                    out += &expand(include, overlay, units)?;
                }
            }
            None => {
                out += line;
                out.push('\n');
            }
        }
    }
    Ok(out)
}

/// Expand `#include "file"` starting from `entry`, looking in the overlay
/// first and the templates second. Each file is pulled in once.
pub fn resolve(entry: &str, overlay: &SourceOverlay) -> Result<ResolvedProgram> {
    let mut units = Vec::new();
    let source = expand(entry, overlay, &mut units)?;
    Ok(ResolvedProgram {
        name: entry.to_owned(),
        source,
        units,
    })
}

/// Run the program through the GLSL front end so that a broken variant is
/// reported with the compiler's own words before the device ever sees it.
pub fn parse_glsl(
    name: &str,
    description: &str,
    source: &str,
    stage: ProgramStage,
) -> Result<naga::Module> {
    let mut parser = naga::front::glsl::Parser::default();
    let options = naga::front::glsl::Options::from(stage.naga_stage());
    parser.parse(&options, source).map_err(|errors| {
        let diagnostics = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Error::Gpu(format!(
            "failed to compile {} ({}):\n{}",
            name, description, diagnostics
        ))
        .into()
    })
}

/// Compile a resolved program into a shader module. The units that went
/// into it are appended to `capture`, minus the view direction stub that
/// the renderer replaces with its own.
pub fn compile(
    gpu: &Gpu,
    program: &ResolvedProgram,
    description: &str,
    stage: ProgramStage,
    capture: Option<&mut Vec<SourceUnit>>,
) -> Result<wgpu::ShaderModule> {
    debug!("compiling {} ({})", program.name, description);
    parse_glsl(&program.name, description, &program.source, stage)?;
    let module = gpu
        .create_glsl_shader_module(&program.name, &program.source, stage.naga_stage())
        .map_err(Error::gpu)?;
    if let Some(capture) = capture {
        capture_units(program, capture);
    }
    Ok(module)
}

pub fn capture_units(program: &ResolvedProgram, capture: &mut Vec<SourceUnit>) {
    capture.extend(
        program
            .units
            .iter()
            .filter(|(name, _)| name != CALC_VIEW_DIR_STUB)
            .cloned(),
    );
}

/// Compiled programs keyed by entry name and the full text they were
/// compiled from, so any change in specialization is a different program.
pub struct ProgramCache<T> {
    programs: FxHashMap<(String, String), T>,
    compilations: usize,
}

impl<T> Default for ProgramCache<T> {
    fn default() -> Self {
        Self {
            programs: FxHashMap::default(),
            compilations: 0,
        }
    }
}

impl<T> ProgramCache<T> {
    pub fn get_or_compile(
        &mut self,
        program: &ResolvedProgram,
        compile: impl FnOnce(&ResolvedProgram) -> Result<T>,
    ) -> Result<&T> {
        let key = (program.name.clone(), program.source.clone());
        if !self.programs.contains_key(&key) {
            self.compilations += 1;
            let compiled = compile(program)?;
            self.programs.insert(key.clone(), compiled);
        } else {
            trace!("reusing {}", program.name);
        }
        self.programs
            .get(&key)
            .ok_or_else(|| Error::Gpu(format!("program {} vanished from the cache", program.name)).into())
    }

    pub fn compilations(&self) -> usize {
        self.compilations
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TRIVIAL_FRAGMENT: &str = r#"#version 450
layout(location=0) out vec4 color;
#include "value.glsl"
void main()
{
    color=value();
}
"#;

    fn overlay() -> SourceOverlay {
        SourceOverlay::default()
            .with("trivial.frag", TRIVIAL_FRAGMENT)
            .with("value.glsl", "#include \"one.glsl\"\nvec4 value()\n{\n    return vec4(one());\n}\n")
            .with("one.glsl", "float one()\n{\n    return 1.0;\n}\n")
    }

    #[test]
    fn test_resolve_includes_each_file_once() -> Result<()> {
        let overlay = overlay().with(
            "twice.frag",
            "#version 450\n#include \"one.glsl\"\n#include \"value.glsl\"\n#include \"one.glsl\"\n",
        );
        let program = resolve("twice.frag", &overlay)?;
        assert_eq!(program.source.matches("float one()").count(), 1);
        let names = program.units.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["twice.frag", "one.glsl", "value.glsl"]);
        assert!(program.source.starts_with("#version 450\n"));
        Ok(())
    }

    #[test]
    fn test_overlay_shadows_templates() -> Result<()> {
        let overlay = SourceOverlay::default()
            .with("x.frag", "#version 450\n#include \"common-functions.glsl\"\n")
            .with("common-functions.glsl", "// shadowed\n");
        let program = resolve("x.frag", &overlay)?;
        assert!(program.source.contains("// shadowed"));
        assert!(!program.source.contains("safeSqrt"));
        Ok(())
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let overlay = SourceOverlay::default().with("x.frag", "#include \"nowhere.glsl\"\n");
        let err = resolve("x.frag", &overlay).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }

    #[test]
    fn test_capture_skips_view_dir_stub() -> Result<()> {
        let overlay = overlay()
            .with("r.frag", "#version 450\n#include \"calc-view-dir.frag\"\n#include \"one.glsl\"\n")
            .with(CALC_VIEW_DIR_STUB, "vec3 calcViewDir()\n{\n    return vec3(0.0);\n}\n");
        let program = resolve("r.frag", &overlay)?;
        let mut captured = Vec::new();
        capture_units(&program, &mut captured);
        let names = captured.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["r.frag", "one.glsl"]);
        Ok(())
    }

    #[test]
    fn test_parse_reports_diagnostics() -> Result<()> {
        let program = resolve("trivial.frag", &overlay())?;
        parse_glsl(&program.name, "trivial", &program.source, ProgramStage::Fragment)?;

        let broken = program.source.replace("color=value();", "color=nothingByThisName;");
        let err = parse_glsl("trivial.frag", "broken", &broken, ProgramStage::Fragment).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Gpu(_))));
        assert!(message.contains("failed to compile trivial.frag (broken)"), "{}", message);
        Ok(())
    }

    #[test]
    fn test_cache_compiles_once_per_source() -> Result<()> {
        let mut cache = ProgramCache::default();
        let a = resolve("trivial.frag", &overlay())?;
        let b = resolve(
            "trivial.frag",
            &overlay().with("one.glsl", "float one()\n{\n    return 2.0;\n}\n"),
        )?;
        assert_eq!(*cache.get_or_compile(&a, |p| Ok(p.source.len()))?, a.source.len());
        cache.get_or_compile(&a, |_| panic!("compiled twice"))?;
        cache.get_or_compile(&b, |p| Ok(p.source.len()))?;
        assert_eq!(cache.compilations(), 2);
        assert_eq!(cache.programs.len(), 2);
        Ok(())
    }
}
