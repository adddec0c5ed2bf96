//! Scene selection.
//!
//! The [`SceneSwitcher`] turns a "show scene X" signal into a
//! [`RenderLoop::switch_scene`] call. By default every selection builds a
//! fresh scene and the outgoing one is dropped after `will_exit_scene`.
//! With retention enabled, outgoing scenes are parked and brought back on
//! their next selection instead.

use std::collections::HashMap;

use crate::backend::GpuBackend;
use crate::render_loop::RenderLoop;
use crate::scene::{Scene, SceneContext, SceneId};

pub struct SceneSwitcher {
    context: SceneContext,
    retain_scenes: bool,
    parked: HashMap<SceneId, Box<dyn Scene>>,
}

impl SceneSwitcher {
    pub fn new(context: SceneContext) -> Self {
        Self {
            context,
            retain_scenes: false,
            parked: HashMap::new(),
        }
    }

    /// Keep exited scenes alive for their next selection.
    pub fn with_retained_scenes(mut self, retain: bool) -> Self {
        self.retain_scenes = retain;
        self
    }

    pub fn context(&self) -> &SceneContext {
        &self.context
    }

    /// Build the scene the loop starts with.
    pub fn initial(&self, id: SceneId) -> Box<dyn Scene> {
        self.context.build(id)
    }

    /// Make `id` the active scene of `render_loop`.
    ///
    /// Selecting the scene that is already active does nothing and returns
    /// `false`.
    pub fn select<B: GpuBackend>(&mut self, render_loop: &mut RenderLoop<B>, id: SceneId) -> bool {
        let current = render_loop.active_scene().id();
        if current == id {
            log::debug!("Scene '{}' is already active", id);
            return false;
        }

        let incoming = match self.parked.remove(&id) {
            Some(scene) => {
                log::debug!("Resuming parked scene '{}'", id);
                scene
            }
            None => self.context.build(id),
        };
        let outgoing = render_loop.switch_scene(incoming);
        if self.retain_scenes {
            self.parked.insert(outgoing.id(), outgoing);
        }
        true
    }

    /// Number of scenes waiting to be resumed.
    pub fn parked(&self) -> usize {
        self.parked.len()
    }
}
