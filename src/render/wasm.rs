use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use glam::Vec3;
use wasm_bindgen::JsCast;
use log::warn;
use web_sys::{window, CanvasRenderingContext2d, Document, HtmlCanvasElement};

use super::common::{backing_size, linear_to_css, project_point, LightParams};
use super::{RenderBackend, SceneRenderer};
use crate::host::CanvasId;
use crate::scene::{PerspectiveCamera, SceneGraph};

/// Canvas elements created by a [`CanvasBackend`], shared with the DOM mount
/// target so it can attach and detach them by id.
pub type CanvasRegistry = Rc<RefCell<HashMap<CanvasId, HtmlCanvasElement>>>;

fn device_pixel_ratio() -> f64 {
    window().map(|window| window.device_pixel_ratio()).unwrap_or(1.0)
}

/// Sizes the drawing buffer in device pixels and the element in CSS pixels.
fn resize_canvas(canvas: &HtmlCanvasElement, (width, height): (u32, u32), pixel_ratio: f64) {
    let (backing_width, backing_height) = backing_size((width, height), pixel_ratio);
    canvas.set_width(backing_width);
    canvas.set_height(backing_height);
    let style = canvas.style();
    let _ = style.set_property("width", &format!("{width}px"));
    let _ = style.set_property("height", &format!("{height}px"));
}

/// Creates 2D canvas renderers for WebAssembly builds.
pub struct CanvasBackend {
    document: Document,
    registry: CanvasRegistry,
    next_canvas: u64,
}

impl CanvasBackend {
    pub fn new(document: Document, registry: CanvasRegistry) -> Self {
        Self {
            document,
            registry,
            next_canvas: 0,
        }
    }
}

impl RenderBackend for CanvasBackend {
    type Renderer = CanvasRenderer;

    fn create_renderer(&mut self, width: u32, height: u32) -> Result<CanvasRenderer> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|err| anyhow!("failed to create canvas: {err:?}"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| anyhow!("created element is not a canvas"))?;
        let size = (width.max(1), height.max(1));
        let pixel_ratio = device_pixel_ratio();
        resize_canvas(&canvas, size, pixel_ratio);
        let _ = canvas.style().set_property("display", "block");

        let context = canvas
            .get_context("2d")
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;

        self.next_canvas += 1;
        let id = CanvasId(self.next_canvas);
        self.registry.borrow_mut().insert(id, canvas.clone());
        Ok(CanvasRenderer {
            id,
            canvas,
            context: Some(context),
            registry: Rc::clone(&self.registry),
            size,
            pixel_ratio,
        })
    }
}

/// Software renderer: projects triangles through the camera, sorts them back
/// to front and fills them flat shaded.
pub struct CanvasRenderer {
    id: CanvasId,
    canvas: HtmlCanvasElement,
    context: Option<CanvasRenderingContext2d>,
    registry: CanvasRegistry,
    /// CSS pixels; the drawing buffer is `size` scaled by `pixel_ratio`.
    size: (u32, u32),
    pixel_ratio: f64,
}

struct Face {
    points: [Vec3; 3],
    depth: f32,
    fill: String,
}

impl CanvasRenderer {
    fn faces(&self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Vec<Face> {
        let (width, height) = (self.size.0 as f32, self.size.1 as f32);
        let view_proj = camera.view_projection();
        let light = LightParams::from_scene(scene);
        let mut faces = Vec::new();
        for item in scene.draw_items() {
            if item.material.wireframe() {
                continue;
            }
            let base = item.material.color.to_linear();
            for triangle in item.geometry.indices().chunks_exact(3) {
                let world = [
                    item.world.transform_point3(item.geometry.position(triangle[0])),
                    item.world.transform_point3(item.geometry.position(triangle[1])),
                    item.world.transform_point3(item.geometry.position(triangle[2])),
                ];
                let normal = (world[1] - world[0]).cross(world[2] - world[0]).normalize_or_zero();
                let centroid = (world[0] + world[1] + world[2]) / 3.0;
                if normal.dot(camera.position - centroid) <= 0.0 {
                    continue;
                }
                let projected = world.map(|point| project_point(view_proj, point, width, height));
                let [Some(a), Some(b), Some(c)] = projected else {
                    continue;
                };
                faces.push(Face {
                    points: [a, b, c],
                    depth: (a.z + b.z + c.z) / 3.0,
                    fill: linear_to_css(base * light.shade(normal)),
                });
            }
        }
        faces.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        faces
    }

    fn stroke(&self, context: &CanvasRenderingContext2d, from: Vec3, to: Vec3) {
        context.begin_path();
        context.move_to(from.x as f64, from.y as f64);
        context.line_to(to.x as f64, to.y as f64);
        context.stroke();
    }
}

impl SceneRenderer for CanvasRenderer {
    fn canvas(&self) -> CanvasId {
        self.id
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.pixel_ratio = device_pixel_ratio();
        resize_canvas(&self.canvas, self.size, self.pixel_ratio);
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        let Some(context) = self.context.as_ref() else {
            return Ok(());
        };
        let (width, height) = (self.size.0 as f32, self.size.1 as f32);
        let view_proj = camera.view_projection();
        let ratio = self.pixel_ratio;
        if let Err(err) = context.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0) {
            warn!("failed to scale canvas context: {err:?}");
        }

        let background = scene
            .background
            .map(|color| color.to_css())
            .unwrap_or_else(|| "#000000".into());
        context.set_fill_style(&background.into());
        context.fill_rect(0.0, 0.0, width as f64, height as f64);

        context.set_line_width(1.0);
        for line in scene.helper_lines() {
            let from = project_point(view_proj, line.from, width, height);
            let to = project_point(view_proj, line.to, width, height);
            if let (Some(from), Some(to)) = (from, to) {
                context.set_stroke_style(&line.color.to_css().into());
                self.stroke(context, from, to);
            }
        }

        for face in self.faces(scene, camera) {
            let [a, b, c] = face.points;
            context.begin_path();
            context.move_to(a.x as f64, a.y as f64);
            context.line_to(b.x as f64, b.y as f64);
            context.line_to(c.x as f64, c.y as f64);
            context.close_path();
            context.set_fill_style(&face.fill.as_str().into());
            context.set_stroke_style(&face.fill.as_str().into());
            context.fill();
            context.stroke();
        }

        for item in scene.draw_items() {
            if !item.material.wireframe() {
                continue;
            }
            context.set_stroke_style(&item.material.color.to_css().into());
            for [a, b] in item.geometry.edges() {
                let from = item.world.transform_point3(item.geometry.position(a));
                let to = item.world.transform_point3(item.geometry.position(b));
                let from = project_point(view_proj, from, width, height);
                let to = project_point(view_proj, to, width, height);
                if let (Some(from), Some(to)) = (from, to) {
                    self.stroke(context, from, to);
                }
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if self.context.take().is_some() {
            self.canvas.set_width(0);
            self.canvas.set_height(0);
            self.registry.borrow_mut().remove(&self.id);
        }
    }
}
