//! The shape viewer component: persisted preferences, the live flags read by
//! the frame loop, and the control panel model the UI renders from.

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::catalog::{self, CATALOG};
use crate::host::{FrameHandle, FrameScheduler, RenderTarget};
use crate::lifecycle::{SceneManager, SceneParams};
use crate::live::LiveFlags;
use crate::preferences::{PreferenceStore, Preferences};
use crate::render::RenderBackend;
use crate::scene::Color;

/// UI events the viewer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    SelectShape(String),
    NextShape,
    PreviousShape,
    ToggleWireframe,
    ToggleAutoRotate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub selected_key: String,
    pub wireframe: bool,
    pub auto_rotate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeButton {
    pub key: &'static str,
    pub name: &'static str,
    pub color: Color,
    pub active: bool,
}

/// Everything needed to draw the viewer's controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPanel {
    pub shapes: Vec<ShapeButton>,
    pub rotation_label: &'static str,
    pub wireframe_label: &'static str,
}

pub struct Viewer<B, T, S, P>
where
    B: RenderBackend,
    T: RenderTarget,
    S: FrameScheduler,
    P: PreferenceStore,
{
    prefs: Preferences<P>,
    state: ViewerState,
    flags: LiveFlags,
    manager: SceneManager<B, T, S>,
}

impl<B, T, S, P> Viewer<B, T, S, P>
where
    B: RenderBackend,
    T: RenderTarget,
    S: FrameScheduler,
    P: PreferenceStore,
{
    /// Reads the three preferences once and seeds the live flags from them.
    pub fn new(backend: B, target: T, scheduler: S, store: P) -> Self {
        let prefs = Preferences::new(store);
        let state = ViewerState {
            selected_key: catalog::find(&prefs.selected_key()).key.to_string(),
            wireframe: prefs.wireframe(),
            auto_rotate: prefs.auto_rotate(),
        };
        let flags = LiveFlags::new(state.wireframe, state.auto_rotate);
        let manager = SceneManager::new(backend, target, scheduler, flags.clone());
        Self {
            prefs,
            state,
            flags,
            manager,
        }
    }

    /// Returns whether the scene is active; see [`SceneManager::mount`].
    pub fn mount(&mut self) -> Result<bool> {
        let active = self.manager.mount(self.params())?;
        if active {
            info!(
                "viewer mounted with {} (wireframe={}, autoRotate={})",
                self.state.selected_key, self.state.wireframe, self.state.auto_rotate
            );
        }
        Ok(active)
    }

    pub fn unmount(&mut self) {
        self.manager.unmount();
    }

    pub fn select_shape(&mut self, key: &str) -> Result<()> {
        let descriptor = catalog::find(key);
        self.state.selected_key = descriptor.key.to_string();
        self.prefs.set_selected_key(descriptor.key);
        if self.manager.is_active() {
            self.manager.reconcile(self.params())?;
        }
        Ok(())
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.state.wireframe = wireframe;
        self.flags.wireframe.set(wireframe);
        self.prefs.set_wireframe(wireframe);
        self.manager.apply_wireframe(wireframe);
    }

    pub fn toggle_wireframe(&mut self) {
        self.set_wireframe(!self.state.wireframe);
    }

    /// Takes effect on the next frame; the loop is never restarted.
    pub fn set_auto_rotate(&mut self, auto_rotate: bool) {
        self.state.auto_rotate = auto_rotate;
        self.flags.auto_rotate.set(auto_rotate);
        self.prefs.set_auto_rotate(auto_rotate);
    }

    pub fn toggle_auto_rotate(&mut self) {
        self.set_auto_rotate(!self.state.auto_rotate);
    }

    pub fn apply(&mut self, command: ViewerCommand) -> Result<()> {
        match command {
            ViewerCommand::SelectShape(key) => self.select_shape(&key)?,
            ViewerCommand::NextShape => {
                let next = catalog::cycle(&self.state.selected_key, 1);
                self.select_shape(next.key)?;
            }
            ViewerCommand::PreviousShape => {
                let previous = catalog::cycle(&self.state.selected_key, -1);
                self.select_shape(previous.key)?;
            }
            ViewerCommand::ToggleWireframe => self.toggle_wireframe(),
            ViewerCommand::ToggleAutoRotate => self.toggle_auto_rotate(),
        }
        Ok(())
    }

    pub fn on_frame(&mut self, frame: FrameHandle) -> Result<bool> {
        self.manager.on_frame(frame)
    }

    pub fn handle_resize(&mut self) {
        self.manager.handle_resize();
    }

    pub fn controls(&self) -> ControlPanel {
        let shapes = CATALOG
            .iter()
            .map(|descriptor| ShapeButton {
                key: descriptor.key,
                name: descriptor.name,
                color: descriptor.color,
                active: descriptor.key == self.state.selected_key,
            })
            .collect();
        ControlPanel {
            shapes,
            rotation_label: if self.state.auto_rotate {
                "Pause rotation"
            } else {
                "Resume rotation"
            },
            wireframe_label: if self.state.wireframe {
                "Solid"
            } else {
                "Wireframe"
            },
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn manager(&self) -> &SceneManager<B, T, S> {
        &self.manager
    }

    fn params(&self) -> SceneParams {
        SceneParams::for_key(&self.state.selected_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessTarget, ManualScheduler};
    use crate::preferences::{MemoryStore, AUTO_ROTATE_KEY, SELECTED_SHAPE_KEY, WIREFRAME_KEY};
    use crate::render::HeadlessBackend;

    type TestViewer = Viewer<HeadlessBackend, HeadlessTarget, ManualScheduler, MemoryStore>;

    fn viewer(store: &MemoryStore) -> (TestViewer, HeadlessTarget, ManualScheduler) {
        let target = HeadlessTarget::new(800.0, 600.0);
        let scheduler = ManualScheduler::new();
        let viewer = Viewer::new(
            HeadlessBackend::new(),
            target.clone(),
            scheduler.clone(),
            store.clone(),
        );
        (viewer, target, scheduler)
    }

    #[test]
    fn starts_from_defaults() {
        let store = MemoryStore::new();
        let (viewer, _, _) = viewer(&store);
        assert_eq!(
            viewer.state(),
            &ViewerState {
                selected_key: "box".into(),
                wireframe: false,
                auto_rotate: true,
            }
        );
    }

    #[test]
    fn wireframe_preference_survives_remount() {
        let store = MemoryStore::new();
        {
            let (mut first, _, _) = viewer(&store);
            first.mount().unwrap();
            first.set_wireframe(true);
            first.unmount();
        }
        let (mut second, _, _) = viewer(&store);
        assert!(second.state().wireframe);
        second.mount().unwrap();
        assert_eq!(second.manager().material_wireframe(), Some(true));
    }

    #[test]
    fn toggles_persist_as_strings() {
        let store = MemoryStore::new();
        let (mut viewer, _, _) = viewer(&store);
        viewer.toggle_wireframe();
        viewer.toggle_auto_rotate();
        assert_eq!(store.raw(WIREFRAME_KEY).as_deref(), Some("true"));
        assert_eq!(store.raw(AUTO_ROTATE_KEY).as_deref(), Some("false"));
    }

    #[test]
    fn selecting_a_shape_rebuilds_with_one_canvas() {
        let store = MemoryStore::new();
        let (mut viewer, target, _) = viewer(&store);
        viewer.mount().unwrap();
        viewer.apply(ViewerCommand::SelectShape("torus".into())).unwrap();
        assert_eq!(target.canvases().len(), 1);
        assert_eq!(viewer.manager().params().unwrap().key(), "torus");
        assert_eq!(store.raw(SELECTED_SHAPE_KEY).as_deref(), Some("torus"));
    }

    #[test]
    fn unknown_stored_shape_falls_back_to_box() {
        let store = MemoryStore::new();
        store.insert_raw(SELECTED_SHAPE_KEY, "teapot");
        let (mut viewer, _, _) = viewer(&store);
        assert_eq!(viewer.state().selected_key, "box");
        viewer.mount().unwrap();
        assert_eq!(viewer.manager().params().unwrap().key(), "box");
    }

    #[test]
    fn selecting_before_mount_only_updates_state() {
        let store = MemoryStore::new();
        let (mut viewer, target, _) = viewer(&store);
        viewer.select_shape("cone").unwrap();
        assert!(!viewer.manager().is_active());
        assert!(target.canvases().is_empty());
        viewer.mount().unwrap();
        assert_eq!(viewer.manager().params().unwrap().key(), "cone");
    }

    #[test]
    fn cycling_wraps_around_the_catalog() {
        let store = MemoryStore::new();
        let (mut viewer, _, _) = viewer(&store);
        viewer.apply(ViewerCommand::PreviousShape).unwrap();
        assert_eq!(viewer.state().selected_key, "dodecahedron");
        viewer.apply(ViewerCommand::NextShape).unwrap();
        assert_eq!(viewer.state().selected_key, "box");
    }

    #[test]
    fn wireframe_toggle_is_applied_in_place() {
        let store = MemoryStore::new();
        let (mut viewer, _, _) = viewer(&store);
        viewer.mount().unwrap();
        viewer.apply(ViewerCommand::ToggleWireframe).unwrap();
        assert_eq!(viewer.manager().material_wireframe(), Some(true));
        viewer.apply(ViewerCommand::ToggleWireframe).unwrap();
        assert_eq!(viewer.manager().material_wireframe(), Some(false));
    }

    #[test]
    fn paused_viewer_keeps_mesh_still() {
        let store = MemoryStore::new();
        let (mut viewer, _, scheduler) = viewer(&store);
        viewer.mount().unwrap();
        viewer.toggle_auto_rotate();
        for _ in 0..4 {
            let frame = scheduler.fire().unwrap();
            assert!(viewer.on_frame(frame).unwrap());
        }
        assert_eq!(viewer.manager().mesh_rotation(), Some(glam::Vec3::ZERO));
    }

    #[test]
    fn control_labels_reflect_state() {
        let store = MemoryStore::new();
        let (mut viewer, _, _) = viewer(&store);
        let panel = viewer.controls();
        assert_eq!(panel.rotation_label, "Pause rotation");
        assert_eq!(panel.wireframe_label, "Wireframe");
        assert_eq!(panel.shapes.len(), CATALOG.len());
        assert!(panel.shapes[0].active);
        assert_eq!(panel.shapes.iter().filter(|button| button.active).count(), 1);

        viewer.toggle_auto_rotate();
        viewer.toggle_wireframe();
        viewer.select_shape("plane").unwrap();
        let panel = viewer.controls();
        assert_eq!(panel.rotation_label, "Resume rotation");
        assert_eq!(panel.wireframe_label, "Solid");
        assert!(panel.shapes[2].active);
    }
}
