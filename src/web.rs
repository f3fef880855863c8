#![cfg(target_arch = "wasm32")]
//! Browser entry points.
//!
//! [`WasmViewer`] mounts the shape viewer and its control panel into a DOM
//! container; [`WasmOrbit`] mounts the orbit scene. Both render through the
//! 2D canvas backend and drive their frame loop with `requestAnimationFrame`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use gloo_events::EventListener;
use log::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, HtmlButtonElement, HtmlCanvasElement, HtmlElement, Storage};

use crate::host::{deliver_frame, CanvasId, FrameHandle, FrameScheduler, ListenerId, RenderTarget};
use crate::input::wasm::WasmInputHandler;
use crate::input::{viewer_command_for_key, InputState};
use crate::orbit::{HumanoidLoader, OrbitView};
use crate::preferences::{PreferenceStore, StoreError};
use crate::render::wasm::{CanvasBackend, CanvasRegistry};
use crate::viewer::{ControlPanel, Viewer, ViewerCommand};

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn js_error(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn document() -> Result<Document> {
    window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow!("document not available"))
}

/// Callback slot filled in once the owning component exists.
type Hook<A> = Rc<RefCell<Option<Box<dyn Fn(A)>>>>;

fn run_hook<A>(hook: &Hook<A>, arg: A) {
    if let Some(callback) = hook.borrow().as_ref() {
        callback(arg);
    }
}

/// Frame callback slot. The callback returns `false` when the app could not
/// take the frame yet.
type FrameHook = Rc<RefCell<Option<Box<dyn Fn(FrameHandle) -> bool>>>>;

/// `window.localStorage`. Missing storage (private browsing, sandboxed
/// frames) surfaces as [`StoreError::Unavailable`].
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    storage: Option<Storage>,
}

impl LocalStorageStore {
    pub fn new() -> Self {
        let storage = window().and_then(|window| window.local_storage().ok().flatten());
        if storage.is_none() {
            warn!("localStorage unavailable; preferences will not persist");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&Storage, StoreError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("localStorage missing".into()))
    }
}

impl Default for LocalStorageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage()?
            .get_item(key)
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|err| StoreError::Unavailable(format!("{err:?}")))
    }
}

/// A DOM element used as the mount point. Canvases created by the backend are
/// looked up in the shared registry when attached; the target keeps its own
/// handles so it can still detach them after the renderer is disposed.
pub struct DomTarget {
    element: HtmlElement,
    registry: CanvasRegistry,
    attached: HashMap<CanvasId, HtmlCanvasElement>,
    listeners: HashMap<ListenerId, EventListener>,
    next_listener: u64,
    on_resize: Hook<()>,
}

impl DomTarget {
    fn new(element: HtmlElement, registry: CanvasRegistry, on_resize: Hook<()>) -> Self {
        Self {
            element,
            registry,
            attached: HashMap::new(),
            listeners: HashMap::new(),
            next_listener: 0,
            on_resize,
        }
    }
}

impl RenderTarget for DomTarget {
    fn is_available(&self) -> bool {
        self.element.is_connected()
    }

    fn bounding_size(&self) -> (f32, f32) {
        let rect = self.element.get_bounding_client_rect();
        (rect.width() as f32, rect.height() as f32)
    }

    fn append_canvas(&mut self, canvas: CanvasId) {
        let Some(element) = self.registry.borrow().get(&canvas).cloned() else {
            warn!("canvas {canvas:?} is not registered");
            return;
        };
        if let Err(err) = self.element.append_child(&element) {
            error!("failed to attach canvas: {err:?}");
            return;
        }
        self.attached.insert(canvas, element);
    }

    fn remove_canvas(&mut self, canvas: CanvasId) {
        let Some(element) = self.attached.remove(&canvas) else {
            return;
        };
        if self.element.contains(Some(element.as_ref())) {
            let _ = self.element.remove_child(&element);
        }
    }

    fn contains_canvas(&self, canvas: CanvasId) -> bool {
        self.attached.contains_key(&canvas)
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        if let Some(window) = window() {
            let hook = Rc::clone(&self.on_resize);
            let listener = EventListener::new(&window, "resize", move |_| run_hook(&hook, ()));
            self.listeners.insert(id, listener);
        }
        id
    }

    fn remove_resize_listener(&mut self, listener: ListenerId) {
        self.listeners.remove(&listener);
    }
}

/// A pending frame and the `requestAnimationFrame` request backing it.
#[derive(Debug, Clone, Copy)]
struct Registration {
    handle: FrameHandle,
    request: i32,
}

type FrameCallback = Closure<dyn FnMut(f64)>;

fn request_animation_frame(callback: &FrameCallback) -> Result<i32> {
    window()
        .ok_or_else(|| anyhow!("window not available"))?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))
}

/// Frame scheduling on `requestAnimationFrame`. One persistent closure is
/// registered for every request; it hands the pending handle to the hook and
/// re-requests the same handle when the hook reports the app busy.
pub struct AnimationFrameScheduler {
    next: u64,
    pending: Rc<Cell<Option<Registration>>>,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl AnimationFrameScheduler {
    fn new(on_frame: FrameHook) -> Self {
        let pending: Rc<Cell<Option<Registration>>> = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::default();
        let fired = Rc::clone(&pending);
        let rearm = Rc::downgrade(&callback);
        let closure = Closure::wrap(Box::new(move |_timestamp: f64| {
            let Some(registration) = fired.take() else {
                return;
            };
            let delivered = on_frame
                .borrow()
                .as_ref()
                .map_or(true, |hook| hook(registration.handle));
            if delivered {
                return;
            }
            warn!("frame {:?} arrived while busy; retrying", registration.handle);
            let Some(callback) = rearm.upgrade() else {
                return;
            };
            let callback = callback.borrow();
            match callback.as_ref().map(request_animation_frame) {
                Some(Ok(request)) => fired.set(Some(Registration {
                    handle: registration.handle,
                    request,
                })),
                Some(Err(err)) => error!("{err:#}"),
                None => {}
            }
        }) as Box<dyn FnMut(f64)>);
        *callback.borrow_mut() = Some(closure);
        Self {
            next: 0,
            pending,
            callback,
        }
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        let request = self
            .callback
            .borrow()
            .as_ref()
            .ok_or_else(|| anyhow!("frame callback missing"))
            .and_then(request_animation_frame);
        match request {
            Ok(request) => self.pending.set(Some(Registration { handle, request })),
            Err(err) => error!("{err:#}"),
        }
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let Some(registration) = self.pending.get().filter(|pending| pending.handle == handle) else {
            return;
        };
        if let Some(window) = window() {
            let _ = window.cancel_animation_frame(registration.request);
        }
        self.pending.set(None);
    }
}

type WebViewer = Viewer<CanvasBackend, DomTarget, AnimationFrameScheduler, LocalStorageStore>;
type WebOrbit = OrbitView<CanvasBackend, DomTarget, AnimationFrameScheduler>;

/// Host plumbing shared by both entry points: a mount element inside the
/// container plus the hooks the target and scheduler call back into.
struct Mount {
    document: Document,
    container: HtmlElement,
    element: HtmlElement,
    backend: CanvasBackend,
    target: DomTarget,
    scheduler: AnimationFrameScheduler,
    on_resize: Hook<()>,
    on_frame: FrameHook,
}

impl Mount {
    fn create(container_id: &str) -> Result<Self> {
        let document = document()?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| anyhow!("container element '{container_id}' not found"))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| anyhow!("container is not an HTML element"))?;
        let element = create_element::<HtmlElement>(&document, "div")?;
        let style = element.style();
        let _ = style.set_property("width", "100%");
        let _ = style.set_property("height", "100%");
        container
            .append_child(&element)
            .map_err(|err| anyhow!("failed to attach mount element: {err:?}"))?;

        let registry = CanvasRegistry::default();
        let on_resize: Hook<()> = Rc::default();
        let on_frame: FrameHook = Rc::default();
        Ok(Self {
            backend: CanvasBackend::new(document.clone(), Rc::clone(&registry)),
            target: DomTarget::new(element.clone(), registry, Rc::clone(&on_resize)),
            scheduler: AnimationFrameScheduler::new(Rc::clone(&on_frame)),
            document,
            container,
            element,
            on_resize,
            on_frame,
        })
    }
}

fn create_element<E: JsCast>(document: &Document, tag: &str) -> Result<E> {
    document
        .create_element(tag)
        .map_err(|err| anyhow!("failed to create <{tag}>: {err:?}"))?
        .dyn_into::<E>()
        .map_err(|_| anyhow!("<{tag}> has an unexpected element type"))
}

/// Shape buttons plus the rotation and wireframe toggles.
struct ControlPanelView {
    root: HtmlElement,
    shapes: Vec<(&'static str, HtmlButtonElement)>,
    rotation: HtmlButtonElement,
    wireframe: HtmlButtonElement,
    listeners: Vec<EventListener>,
}

impl ControlPanelView {
    fn build(
        document: &Document,
        panel: &ControlPanel,
        dispatch: Rc<dyn Fn(ViewerCommand)>,
    ) -> Result<Self> {
        let root = create_element::<HtmlElement>(document, "div")?;
        root.set_class_name("shape-viewer-controls");
        let mut listeners = Vec::new();

        let mut button = |label: &str, command: ViewerCommand| -> Result<HtmlButtonElement> {
            let button = create_element::<HtmlButtonElement>(document, "button")?;
            button.set_type("button");
            button.set_text_content(Some(label));
            root.append_child(&button)
                .map_err(|err| anyhow!("failed to attach button: {err:?}"))?;
            let dispatch = Rc::clone(&dispatch);
            listeners.push(EventListener::new(&button, "click", move |_| {
                dispatch(command.clone())
            }));
            Ok(button)
        };

        let mut shapes = Vec::with_capacity(panel.shapes.len());
        for shape in &panel.shapes {
            let element = button(shape.name, ViewerCommand::SelectShape(shape.key.into()))?;
            shapes.push((shape.key, element));
        }
        let rotation = button(panel.rotation_label, ViewerCommand::ToggleAutoRotate)?;
        let wireframe = button(panel.wireframe_label, ViewerCommand::ToggleWireframe)?;

        let view = Self {
            root,
            shapes,
            rotation,
            wireframe,
            listeners,
        };
        view.sync(panel);
        Ok(view)
    }

    fn sync(&self, panel: &ControlPanel) {
        for ((_, element), shape) in self.shapes.iter().zip(&panel.shapes) {
            let style = element.style();
            if shape.active {
                let _ = style.set_property("background", &shape.color.to_css());
                let _ = style.set_property("color", "#000");
            } else {
                let _ = style.remove_property("background");
                let _ = style.remove_property("color");
            }
        }
        self.rotation.set_text_content(Some(panel.rotation_label));
        self.wireframe.set_text_content(Some(panel.wireframe_label));
    }
}

impl Drop for ControlPanelView {
    fn drop(&mut self) {
        self.listeners.clear();
        self.root.remove();
    }
}

struct ViewerApp {
    viewer: WebViewer,
    panel: Option<ControlPanelView>,
    _input: Option<WasmInputHandler>,
    element: HtmlElement,
}

impl ViewerApp {
    fn dispatch(&mut self, command: ViewerCommand) {
        if let Err(err) = self.viewer.apply(command) {
            error!("viewer command failed: {err:#}");
        }
        if let Some(panel) = self.panel.as_ref() {
            panel.sync(&self.viewer.controls());
        }
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        self.viewer.unmount();
        self.element.remove();
    }
}

fn dispatcher(app: Weak<RefCell<ViewerApp>>) -> Rc<dyn Fn(ViewerCommand)> {
    Rc::new(move |command| {
        if let Some(app) = app.upgrade() {
            if let Ok(mut app) = app.try_borrow_mut() {
                app.dispatch(command);
            }
        }
    })
}

#[wasm_bindgen]
pub struct WasmViewer {
    inner: Rc<RefCell<ViewerApp>>,
}

#[wasm_bindgen]
impl WasmViewer {
    /// Mounts the viewer and its controls inside the element with id
    /// `container_id`.
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: String) -> Result<WasmViewer, JsValue> {
        let mount = Mount::create(&container_id).map_err(js_error)?;
        let Mount {
            document,
            container,
            element,
            backend,
            target,
            scheduler,
            on_resize,
            on_frame,
        } = mount;

        let viewer = Viewer::new(backend, target, scheduler, LocalStorageStore::new());
        let inner = Rc::new(RefCell::new(ViewerApp {
            viewer,
            panel: None,
            _input: None,
            element: element.clone(),
        }));

        let weak = Rc::downgrade(&inner);
        *on_frame.borrow_mut() = Some(Box::new(move |frame| {
            let Some(app) = weak.upgrade() else {
                return true;
            };
            deliver_frame(&*app, frame, |app, frame| {
                if let Err(err) = app.viewer.on_frame(frame) {
                    error!("frame failed: {err:#}");
                }
            })
        }));
        let weak = Rc::downgrade(&inner);
        *on_resize.borrow_mut() = Some(Box::new(move |()| {
            if let Some(app) = weak.upgrade() {
                if let Ok(mut app) = app.try_borrow_mut() {
                    app.viewer.handle_resize();
                }
            }
        }));

        let dispatch = dispatcher(Rc::downgrade(&inner));
        let panel = {
            let app = inner.borrow();
            ControlPanelView::build(&document, &app.viewer.controls(), Rc::clone(&dispatch))
                .map_err(js_error)?
        };
        container
            .insert_before(&panel.root, Some(element.as_ref()))
            .map_err(|err| js_error(format!("failed to attach controls: {err:?}")))?;

        let keys = Rc::clone(&dispatch);
        let input = WasmInputHandler::attach(&element, Arc::new(InputState::new()), move |key| {
            if let Some(command) = viewer_command_for_key(key) {
                keys(command);
            }
        })
        .map_err(js_error)?;

        {
            let mut app = inner.borrow_mut();
            app.panel = Some(panel);
            app._input = Some(input);
            let active = app.viewer.mount().map_err(js_error)?;
            if !active {
                warn!("viewer container is not attached; scene not created");
            }
        }
        info!("shape viewer ready in #{container_id}");
        Ok(Self { inner })
    }

    #[wasm_bindgen(js_name = selectShape)]
    pub fn select_shape(&self, key: &str) {
        self.inner
            .borrow_mut()
            .dispatch(ViewerCommand::SelectShape(key.to_string()));
    }

    #[wasm_bindgen(js_name = toggleWireframe)]
    pub fn toggle_wireframe(&self) {
        self.inner
            .borrow_mut()
            .dispatch(ViewerCommand::ToggleWireframe);
    }

    #[wasm_bindgen(js_name = toggleAutoRotate)]
    pub fn toggle_auto_rotate(&self) {
        self.inner
            .borrow_mut()
            .dispatch(ViewerCommand::ToggleAutoRotate);
    }

    /// Current preferences as JSON (`selectedKey`, `wireframe`, `autoRotate`).
    pub fn state(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.borrow().viewer.state()).map_err(js_error)
    }

    pub fn unmount(&self) {
        self.inner.borrow_mut().viewer.unmount();
    }
}

struct OrbitApp {
    view: WebOrbit,
    input: Arc<InputState>,
    _handler: Option<WasmInputHandler>,
    element: HtmlElement,
}

impl OrbitApp {
    fn frame(&mut self, frame: FrameHandle) -> Result<bool> {
        let drag = self.input.take_drag();
        if drag != glam::Vec2::ZERO {
            self.view.pointer_drag(drag.x, drag.y);
        }
        let wheel = self.input.take_wheel();
        if wheel != 0.0 {
            self.view.wheel(wheel);
        }
        self.view.on_frame(frame)
    }
}

impl Drop for OrbitApp {
    fn drop(&mut self) {
        self.view.unmount();
        self.element.remove();
    }
}

#[wasm_bindgen]
pub struct WasmOrbit {
    inner: Rc<RefCell<OrbitApp>>,
}

#[wasm_bindgen]
impl WasmOrbit {
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: String) -> Result<WasmOrbit, JsValue> {
        let Mount {
            element,
            backend,
            target,
            scheduler,
            on_resize,
            on_frame,
            ..
        } = Mount::create(&container_id).map_err(js_error)?;

        let view = OrbitView::new(backend, target, scheduler, &HumanoidLoader).map_err(js_error)?;
        let input = Arc::new(InputState::new());
        let handler =
            WasmInputHandler::attach(&element, Arc::clone(&input), |_| {}).map_err(js_error)?;
        let inner = Rc::new(RefCell::new(OrbitApp {
            view,
            input,
            _handler: Some(handler),
            element,
        }));

        let weak = Rc::downgrade(&inner);
        *on_frame.borrow_mut() = Some(Box::new(move |frame| {
            let Some(app) = weak.upgrade() else {
                return true;
            };
            deliver_frame(&*app, frame, |app, frame| {
                if let Err(err) = app.frame(frame) {
                    error!("frame failed: {err:#}");
                }
            })
        }));
        let weak = Rc::downgrade(&inner);
        *on_resize.borrow_mut() = Some(Box::new(move |()| {
            if let Some(app) = weak.upgrade() {
                if let Ok(mut app) = app.try_borrow_mut() {
                    app.view.handle_resize();
                }
            }
        }));

        inner.borrow_mut().view.mount().map_err(js_error)?;
        info!("orbit scene ready in #{container_id}");
        Ok(Self { inner })
    }

    pub fn unmount(&self) {
        self.inner.borrow_mut().view.unmount();
    }
}
