//! Per-scene pipeline cache.
//!
//! Each [`SceneId`] gets at most one [`PipelineEntry`] for the life of the
//! process. The first resolution compiles the scene's render pipeline (and
//! its compute pipeline, if it declares one); later resolutions return the
//! same `Arc` without touching the backend.
//!
//! A failed resolution is remembered too, so a scene with a broken shader is
//! logged once instead of recompiled every frame. Call
//! [`clear_failures`](PipelineCache::clear_failures) after changing the
//! shader library to try again.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{ComputePipelineDesc, GpuBackend, RenderPipelineDesc};
use crate::error::PipelineError;
use crate::scene::{SceneId, ShaderIds};

/// Compiled pipelines for one scene kind.
pub struct PipelineEntry<B: GpuBackend> {
    pub scene: SceneId,
    pub render: B::RenderPipeline,
    pub compute: Option<B::ComputePipeline>,
    pub color_format: wgpu::TextureFormat,
}

pub struct PipelineCache<B: GpuBackend> {
    entries: HashMap<SceneId, Arc<PipelineEntry<B>>>,
    failures: HashMap<SceneId, PipelineError>,
    compile_count: usize,
}

impl<B: GpuBackend> PipelineCache<B> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            failures: HashMap::new(),
            compile_count: 0,
        }
    }

    /// Return the pipelines for `scene`, compiling them on first use.
    pub fn resolve(
        &mut self,
        backend: &mut B,
        scene: SceneId,
        shaders: &ShaderIds,
        color_format: wgpu::TextureFormat,
    ) -> Result<Arc<PipelineEntry<B>>, PipelineError> {
        if let Some(entry) = self.entries.get(&scene) {
            return Ok(Arc::clone(entry));
        }
        if let Some(err) = self.failures.get(&scene) {
            return Err(err.clone());
        }

        self.compile_count += 1;
        match Self::compile(backend, scene, shaders, color_format) {
            Ok(entry) => {
                log::info!(
                    "Compiled pipeline for scene '{}' ({} + {}{})",
                    scene,
                    shaders.vertex,
                    shaders.fragment,
                    shaders.compute.map(|c| format!(", compute {c}")).unwrap_or_default()
                );
                let entry = Arc::new(entry);
                self.entries.insert(scene, Arc::clone(&entry));
                Ok(entry)
            }
            Err(err) => {
                log::error!("{}", err);
                self.failures.insert(scene, err.clone());
                Err(err)
            }
        }
    }

    fn compile(
        backend: &mut B,
        scene: SceneId,
        shaders: &ShaderIds,
        color_format: wgpu::TextureFormat,
    ) -> Result<PipelineEntry<B>, PipelineError> {
        let render = backend.create_render_pipeline(&RenderPipelineDesc {
            scene,
            vertex: shaders.vertex,
            fragment: shaders.fragment,
            color_format,
            layout: scene.binding_layout(),
        })?;
        let compute = match shaders.compute {
            Some(entry_point) => Some(backend.create_compute_pipeline(&ComputePipelineDesc { scene, entry_point })?),
            None => None,
        };
        Ok(PipelineEntry {
            scene,
            render,
            compute,
            color_format,
        })
    }

    /// Whether `scene` has a compiled entry.
    pub fn contains(&self, scene: SceneId) -> bool {
        self.entries.contains_key(&scene)
    }

    /// The remembered failure for `scene`, if any.
    pub fn failure(&self, scene: SceneId) -> Option<&PipelineError> {
        self.failures.get(&scene)
    }

    /// Forget remembered failures so the next resolution recompiles.
    pub fn clear_failures(&mut self) {
        if !self.failures.is_empty() {
            log::debug!("Clearing {} remembered pipeline failures", self.failures.len());
        }
        self.failures.clear();
    }

    /// Number of compilations attempted, successful or not.
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: GpuBackend> Default for PipelineCache<B> {
    fn default() -> Self {
        Self::new()
    }
}
