use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use shape_viewer::app::{map_keycode, map_mouse_button, RedrawScheduler, WindowTarget};
use shape_viewer::host::{FrameHandle, HeadlessTarget, ManualScheduler, RenderTarget};
use shape_viewer::input::{viewer_command_for_key, InputState};
use shape_viewer::orbit::{HumanoidLoader, ModelLoader, ObjModelLoader, OrbitView};
use shape_viewer::preferences::FileStore;
use shape_viewer::render::native::WgpuBackend;
use shape_viewer::render::HeadlessBackend;
use shape_viewer::viewer::{ControlPanel, Viewer};

const DEFAULT_PREFS_FILE: &str = "shape-viewer-prefs.json";
const PREFS_ENV: &str = "SHAPE_VIEWER_PREFS";
const DEFAULT_FRAMES: u32 = 60;
const USAGE: &str = "Usage: shape-viewer [--orbit] [--model <file.obj>] [--prefs <path>] \
[--shape <key>] [--wireframe on|off] [--auto-rotate on|off] [--headless] [--frames <n>]";

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }
    info!("preferences stored in {}", options.prefs.display());

    if options.headless {
        return run_headless(&options);
    }
    match run_interactive(&options) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --headless mode.");
            run_headless(&options)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(options: &CliOptions) -> Result<()> {
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let target = HeadlessTarget::new(1280.0, 720.0);
    let scheduler = ManualScheduler::new();

    if options.orbit {
        let loader = options.model_loader();
        let mut view = OrbitView::new(backend, target.clone(), scheduler.clone(), loader.as_ref())?;
        view.mount()?;
        if let Some(model) = view.orbit().model() {
            println!(
                "Mounted orbit scene: model={} parts={}",
                model.name,
                model.children.len()
            );
        }
        let rendered = pump_frames(&scheduler, options.frames, |frame| view.on_frame(frame))?;
        println!("Rendered {rendered} frame(s)");
        let position = view.orbit().camera.position;
        println!(
            "Camera position=({:.2}, {:.2}, {:.2})",
            position.x, position.y, position.z
        );
        println!("Renderer canvases attached: {}", target.canvases().len());
        view.unmount();
    } else {
        let store = FileStore::new(&options.prefs);
        let mut viewer = Viewer::new(backend, target.clone(), scheduler.clone(), store);
        options.apply_overrides(&mut viewer)?;
        viewer.mount()?;
        let state = viewer.state();
        println!(
            "Mounted viewer: shape={} wireframe={} autoRotate={}",
            state.selected_key, state.wireframe, state.auto_rotate
        );
        println!("Controls: {}", describe_controls(&viewer.controls()));
        let rendered = pump_frames(&scheduler, options.frames, |frame| viewer.on_frame(frame))?;
        println!("Rendered {rendered} frame(s)");
        if let Some(rotation) = viewer.manager().mesh_rotation() {
            println!(
                "Mesh rotation=({:.2}, {:.2}, {:.2})",
                rotation.x, rotation.y, rotation.z
            );
        }
        println!("Renderer canvases attached: {}", target.canvases().len());
        viewer.unmount();
        if let Some(mesh) = viewer.manager().released_mesh() {
            println!(
                "Released mesh: {} geometryDisposed={} materialDisposed={}",
                mesh.name,
                mesh.geometry.is_disposed(),
                mesh.material.is_disposed()
            );
        }
    }

    let stats = log.snapshot();
    info!(
        "headless run: {} renderer(s) created, {} disposed",
        stats.renderers_created, stats.renderers_disposed
    );
    println!("Scene torn down");
    Ok(())
}

fn pump_frames(
    scheduler: &ManualScheduler,
    frames: u32,
    mut tick: impl FnMut(FrameHandle) -> Result<bool>,
) -> Result<u32> {
    let mut rendered = 0;
    for _ in 0..frames {
        let Some(frame) = scheduler.fire() else {
            break;
        };
        if tick(frame)? {
            rendered += 1;
        }
    }
    Ok(rendered)
}

fn describe_controls(panel: &ControlPanel) -> String {
    let shapes: Vec<String> = panel
        .shapes
        .iter()
        .map(|button| {
            if button.active {
                format!("[{}]", button.name)
            } else {
                button.name.to_string()
            }
        })
        .collect();
    format!(
        "{} | {} | {}",
        shapes.join(" "),
        panel.rotation_label,
        panel.wireframe_label
    )
}

fn run_interactive(options: &CliOptions) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let mut app = ViewerApp {
        options: options.clone(),
        screen: None,
        input: InputState::new(),
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(screen) = app.screen.as_mut() {
        screen.unmount();
    }
    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

type NativeViewer = Viewer<WgpuBackend, WindowTarget, RedrawScheduler, FileStore>;
type NativeOrbit = OrbitView<WgpuBackend, WindowTarget, RedrawScheduler>;

enum Screen {
    Viewer {
        window: Arc<Window>,
        scheduler: RedrawScheduler,
        viewer: NativeViewer,
    },
    Orbit {
        window: Arc<Window>,
        scheduler: RedrawScheduler,
        view: NativeOrbit,
    },
}

impl Screen {
    fn window(&self) -> &Window {
        match self {
            Screen::Viewer { window, .. } | Screen::Orbit { window, .. } => window,
        }
    }

    fn handle_resize(&mut self) {
        match self {
            Screen::Viewer { viewer, .. } => viewer.handle_resize(),
            Screen::Orbit { view, .. } => view.handle_resize(),
        }
    }

    fn unmount(&mut self) {
        match self {
            Screen::Viewer { viewer, .. } => viewer.unmount(),
            Screen::Orbit { view, .. } => view.unmount(),
        }
    }

    fn refresh_title(&self) {
        if let Screen::Viewer { window, viewer, .. } = self {
            let panel = viewer.controls();
            window.set_title(&format!(
                "Shape Viewer - {} | [R] {} | [W] {}",
                describe_active(&panel),
                panel.rotation_label,
                panel.wireframe_label
            ));
        }
    }
}

fn describe_active(panel: &ControlPanel) -> &'static str {
    panel
        .shapes
        .iter()
        .find(|button| button.active)
        .map(|button| button.name)
        .unwrap_or_default()
}

struct ViewerApp {
    options: CliOptions,
    screen: Option<Screen>,
    input: InputState,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn open(&self, event_loop: &ActiveEventLoop) -> Result<Screen> {
        let title = if self.options.orbit {
            "Orbit Scene"
        } else {
            "Shape Viewer"
        };
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title(title)
                        .with_inner_size(LogicalSize::new(1280.0, 720.0)),
                )
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let backend = block_on(WgpuBackend::new(Arc::clone(&window)))
            .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;
        let target = WindowTarget::new(Arc::clone(&window));
        let scheduler = RedrawScheduler::new(Arc::clone(&window));

        if self.options.orbit {
            let loader = self.options.model_loader();
            let mut view = OrbitView::new(backend, target, scheduler.clone(), loader.as_ref())?;
            view.mount()?;
            Ok(Screen::Orbit {
                window,
                scheduler,
                view,
            })
        } else {
            let store = FileStore::new(&self.options.prefs);
            let mut viewer = Viewer::new(backend, target, scheduler.clone(), store);
            self.options.apply_overrides(&mut viewer)?;
            viewer.mount()?;
            let screen = Screen::Viewer {
                window,
                scheduler,
                viewer,
            };
            screen.refresh_title();
            Ok(screen)
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(screen) = self.screen.as_mut() else {
            return Ok(());
        };
        match screen {
            Screen::Viewer {
                scheduler, viewer, ..
            } => {
                if let Some(frame) = scheduler.fire() {
                    viewer.on_frame(frame)?;
                }
            }
            Screen::Orbit {
                scheduler, view, ..
            } => {
                let drag = self.input.take_drag();
                if drag != Vec2::ZERO {
                    view.pointer_drag(drag.x, drag.y);
                }
                let wheel = self.input.take_wheel();
                if wheel != 0.0 {
                    view.wheel(wheel);
                }
                if let Some(frame) = scheduler.fire() {
                    view.on_frame(frame)?;
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent) -> Result<()> {
        let PhysicalKey::Code(code) = event.physical_key else {
            return Ok(());
        };
        let Some(key) = map_keycode(code) else {
            return Ok(());
        };
        if event.state == ElementState::Released || event.repeat {
            return Ok(());
        }
        if let Some(Screen::Viewer { viewer, .. }) = self.screen.as_mut() {
            if let Some(command) = viewer_command_for_key(key) {
                viewer.apply(command)?;
            }
        }
        if let Some(screen) = self.screen.as_ref() {
            screen.refresh_title();
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.screen.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(screen) => self.screen = Some(screen),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(screen) = self.screen.as_mut() else {
            return;
        };
        if screen.window().id() != window_id {
            return;
        }
        let result = match event {
            WindowEvent::CloseRequested => {
                screen.unmount();
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                screen.handle_resize();
                Ok(())
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_mouse_button(button);
                match state {
                    ElementState::Pressed => self.input.set_mouse_button_down(button),
                    ElementState::Released => self.input.set_mouse_button_up(button),
                }
                Ok(())
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
                Ok(())
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => -lines * 100.0,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                };
                self.input.add_wheel(delta_y);
                Ok(())
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    orbit: bool,
    model: Option<PathBuf>,
    prefs: PathBuf,
    shape: Option<String>,
    wireframe: Option<bool>,
    auto_rotate: Option<bool>,
    headless: bool,
    frames: u32,
    help: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let default_prefs = env::var_os(PREFS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS_FILE));
        let mut options = Self {
            orbit: false,
            model: None,
            prefs: default_prefs,
            shape: None,
            wireframe: None,
            auto_rotate: None,
            headless: false,
            frames: DEFAULT_FRAMES,
            help: false,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--orbit" => options.orbit = true,
                "--headless" => options.headless = true,
                "--help" | "-h" => options.help = true,
                "--model" => options.model = Some(PathBuf::from(value("--model")?)),
                "--prefs" => options.prefs = PathBuf::from(value("--prefs")?),
                "--shape" => options.shape = Some(value("--shape")?),
                "--wireframe" => options.wireframe = Some(parse_switch(&value("--wireframe")?)?),
                "--auto-rotate" => {
                    options.auto_rotate = Some(parse_switch(&value("--auto-rotate")?)?)
                }
                "--frames" => {
                    let raw = value("--frames")?;
                    options.frames = raw
                        .parse()
                        .with_context(|| format!("invalid frame count: {raw}"))?;
                }
                other => bail!("Unknown argument: {other}\n{USAGE}"),
            }
        }
        Ok(options)
    }

    fn model_loader(&self) -> Box<dyn ModelLoader> {
        match &self.model {
            Some(path) => Box::new(ObjModelLoader::new(path)),
            None => Box::new(HumanoidLoader),
        }
    }

    /// Applies command line choices as if the user had made them in the UI,
    /// so they persist like any other change.
    fn apply_overrides<B, T, S>(&self, viewer: &mut Viewer<B, T, S, FileStore>) -> Result<()>
    where
        B: shape_viewer::render::RenderBackend,
        T: RenderTarget,
        S: shape_viewer::host::FrameScheduler,
    {
        if let Some(shape) = &self.shape {
            viewer.select_shape(shape)?;
        }
        if let Some(wireframe) = self.wireframe {
            viewer.set_wireframe(wireframe);
        }
        if let Some(auto_rotate) = self.auto_rotate {
            viewer.set_auto_rotate(auto_rotate);
        }
        Ok(())
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("expected on or off, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_every_flag() {
        let options = parse(&[
            "--orbit",
            "--model",
            "robot.obj",
            "--prefs",
            "p.json",
            "--shape",
            "torus",
            "--wireframe",
            "on",
            "--auto-rotate",
            "off",
            "--headless",
            "--frames",
            "5",
        ])
        .unwrap();
        assert!(options.orbit && options.headless);
        assert_eq!(options.model, Some(PathBuf::from("robot.obj")));
        assert_eq!(options.prefs, PathBuf::from("p.json"));
        assert_eq!(options.shape.as_deref(), Some("torus"));
        assert_eq!(options.wireframe, Some(true));
        assert_eq!(options.auto_rotate, Some(false));
        assert_eq!(options.frames, 5);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--wireframe", "maybe"]).is_err());
    }
}
