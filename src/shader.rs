//! WGSL shader library.
//!
//! A [`WgslLibrary`] is a set of WGSL modules, each parsed and validated with
//! naga up front. Scenes refer to shader functions by entry-point name only;
//! the library maps every name to the module that defines it and the stage
//! it was declared for. A name that is not in the library is a
//! [`PipelineError::MissingFunction`](crate::error::PipelineError), never a
//! panic inside wgpu.
//!
//! The built-in library has one module per scene plus one for the sand
//! compute kernel, so each module's bind group layout is independent.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{ShaderError, ShaderStage};

pub const PARALLAX_WGSL: &str = include_str!("shaders/parallax.wgsl");
pub const PIXEL_LIGHTING_WGSL: &str = include_str!("shaders/pixel_lighting.wgsl");
pub const CELLULAR_SAND_WGSL: &str = include_str!("shaders/cellular_sand.wgsl");
pub const CELLULAR_SAND_COMPUTE_WGSL: &str = include_str!("shaders/cellular_sand_compute.wgsl");

/// Where an entry point lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Index into the library's modules.
    pub module: usize,
    pub stage: ShaderStage,
}

#[derive(Debug)]
struct Module {
    label: String,
    source: String,
}

/// Validated WGSL modules indexed by entry-point name.
#[derive(Debug, Clone)]
pub struct WgslLibrary {
    modules: Arc<[Module]>,
    entries: HashMap<String, EntryPoint>,
}

impl WgslLibrary {
    /// The shaders compiled into the crate.
    pub fn builtin() -> Result<Self, ShaderError> {
        Self::from_sources([
            ("parallax.wgsl", PARALLAX_WGSL),
            ("pixel_lighting.wgsl", PIXEL_LIGHTING_WGSL),
            ("cellular_sand.wgsl", CELLULAR_SAND_WGSL),
            ("cellular_sand_compute.wgsl", CELLULAR_SAND_COMPUTE_WGSL),
        ])
    }

    /// Build a library from `(label, source)` pairs.
    pub fn from_sources<L, S>(sources: impl IntoIterator<Item = (L, S)>) -> Result<Self, ShaderError>
    where
        L: Into<String>,
        S: Into<String>,
    {
        let mut modules = Vec::new();
        let mut entries: HashMap<String, EntryPoint> = HashMap::new();

        for (index, (label, source)) in sources.into_iter().enumerate() {
            let label = label.into();
            let source = source.into();
            let module = validate(&label, &source)?;

            for entry in &module.entry_points {
                let stage = match entry.stage {
                    naga::ShaderStage::Vertex => ShaderStage::Vertex,
                    naga::ShaderStage::Fragment => ShaderStage::Fragment,
                    naga::ShaderStage::Compute => ShaderStage::Compute,
                };
                if let Some(existing) = entries.get(&entry.name) {
                    let first: &Module = &modules[existing.module];
                    return Err(ShaderError::DuplicateEntryPoint {
                        name: entry.name.clone(),
                        first: first.label.clone(),
                        second: label,
                    });
                }
                entries.insert(entry.name.clone(), EntryPoint { module: index, stage });
            }

            log::debug!("Validated shader module {} ({} entry points)", label, module.entry_points.len());
            modules.push(Module { label, source });
        }

        Ok(Self {
            modules: modules.into(),
            entries,
        })
    }

    /// Load every `*.wgsl` file in `dir`, in file-name order.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let dir = dir.as_ref();
        let io_err = |source| ShaderError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "wgsl") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let source = fs::read_to_string(&path).map_err(|source| ShaderError::Io {
                path: path.clone(),
                source,
            })?;
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            sources.push((label, source));
        }
        Self::from_sources(sources)
    }

    pub fn entry(&self, name: &str) -> Option<EntryPoint> {
        self.entries.get(name).copied()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn label(&self, module: usize) -> &str {
        &self.modules[module].label
    }

    pub fn source(&self, module: usize) -> &str {
        &self.modules[module].source
    }

    /// All entry points, in no particular order.
    pub fn entry_points(&self) -> impl Iterator<Item = (&str, EntryPoint)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), *entry))
    }
}

fn validate(label: &str, source: &str) -> Result<naga::Module, ShaderError> {
    let module = wgsl::parse_str(source).map_err(|err| ShaderError::Parse {
        module: label.to_string(),
        message: err.emit_to_string(source),
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator.validate(&module).map_err(|err| ShaderError::Validation {
        module: label.to_string(),
        message: err.to_string(),
    })?;

    Ok(module)
}
