//! Preview pane: paints the mount surface and forwards input to the sessions.

use std::collections::HashMap;
use std::sync::Arc;

use egui::{Align2, Color32, ColorImage, FontId, Pos2, Rect, Response, Sense, Stroke, TextureHandle, Ui, Vec2};
use image::RgbaImage;

use crate::session::{
    CameraView, FrameRequest, GizmoAction, MountNode, PointerButton, SessionManager, SurfaceEvent, SurfaceId,
    SurfaceSize, HUD_BOTTOM_RIGHT, HUD_TOP_LEFT,
};

use super::gpu::SurfaceRegistry;

pub(crate) const BACKGROUND: Color32 = Color32::from_rgb(4, 10, 6);
pub(crate) const ACCENT: Color32 = Color32::from_rgb(134, 247, 162);
pub(crate) const HUD: Color32 = Color32::from_rgb(124, 239, 161);
pub(crate) const DIM: Color32 = Color32::from_rgb(82, 128, 96);
const GRID: Color32 = Color32::from_rgba_premultiplied(10, 22, 14, 22);
const GRID_STEP: f32 = 20.0;

const BUTTONS: [egui::PointerButton; 3] =
    [egui::PointerButton::Primary, egui::PointerButton::Secondary, egui::PointerButton::Middle];

/// Result of one pane frame.
#[derive(Debug, Clone, Copy)]
pub struct PaneOutput {
    pub request: FrameRequest,
    /// New playback state after a click on a media session.
    pub toggled: Option<bool>,
}

pub struct PreviewPane {
    registry: Arc<SurfaceRegistry>,
    /// Media textures keyed by node index; the `usize` tags the pixel buffer.
    media: HashMap<usize, (usize, TextureHandle)>,
    viewport: Option<(SurfaceId, u64, egui::TextureId)>,
}

impl PreviewPane {
    pub fn new(registry: Arc<SurfaceRegistry>) -> Self {
        Self {
            registry,
            media: HashMap::new(),
            viewport: None,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut Ui,
        sessions: &mut SessionManager,
        render_state: Option<&egui_wgpu::RenderState>,
        pixel_ratio_cap: f32,
    ) -> PaneOutput {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

        let ratio = ui.ctx().pixels_per_point().min(pixel_ratio_cap);
        sessions.set_pixel_ratio(ratio);
        let size = SurfaceSize::new(rect.width().round() as u32, rect.height().round() as u32);
        let mut request = sessions.dispatch(SurfaceEvent::Resize { size });

        request = request.merge(self.handle_input(ui, &response, rect, sessions));
        let toggled = if response.clicked() { sessions.click() } else { None };

        let actions = self.paint(ui, rect, sessions, render_state);
        for action in actions {
            request = request.merge(sessions.dispatch(SurfaceEvent::Gizmo(action)));
        }
        PaneOutput { request, toggled }
    }

    /// Release every texture this pane registered.
    pub fn release(&mut self, render_state: Option<&egui_wgpu::RenderState>) {
        self.media.clear();
        if let (Some((_, _, id)), Some(rs)) = (self.viewport.take(), render_state) {
            rs.renderer.write().free_texture(&id);
        }
    }

    fn handle_input(&mut self, ui: &Ui, response: &Response, rect: Rect, sessions: &mut SessionManager) -> FrameRequest {
        let mut request = FrameRequest::Idle;
        let local = |p: Pos2| glam::Vec2::new(p.x - rect.min.x, p.y - rect.min.y);

        for egui_button in BUTTONS {
            if response.drag_started_by(egui_button) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let button = pointer_button(egui_button);
                    request = request.merge(sessions.dispatch(SurfaceEvent::PointerDown { button, pos: local(pos) }));
                }
            }
        }
        if response.dragged() && response.drag_delta() != Vec2::ZERO {
            if let Some(pos) = response.interact_pointer_pos() {
                request = request.merge(sessions.dispatch(SurfaceEvent::PointerMove { pos: local(pos) }));
            }
        }
        for egui_button in BUTTONS {
            if response.drag_stopped_by(egui_button) {
                let button = pointer_button(egui_button);
                request = request.merge(sessions.dispatch(SurfaceEvent::PointerUp { button }));
            }
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                request = request.merge(sessions.dispatch(SurfaceEvent::Wheel { delta: -scroll }));
            }
        }
        request
    }

    fn paint(
        &mut self,
        ui: &mut Ui,
        rect: Rect,
        sessions: &SessionManager,
        render_state: Option<&egui_wgpu::RenderState>,
    ) -> Vec<GizmoAction> {
        let mut actions = Vec::new();
        let mut seen_media = Vec::new();
        let mut viewport_drawn = false;
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BACKGROUND);

        for (index, node) in sessions.mount().nodes().enumerate() {
            match node {
                MountNode::Backdrop => paint_backdrop(&painter, rect),
                MountNode::Image { alt, pixels, .. } => match pixels {
                    Some(pixels) => {
                        self.paint_media(ui, &painter, rect, index, pixels);
                        seen_media.push(index);
                    }
                    None => centered(&painter, rect, alt, DIM, 13.0),
                },
                MountNode::Video { frame: Some(frame), .. } | MountNode::Canvas { frame: Some(frame), .. } => {
                    self.paint_media(ui, &painter, rect, index, frame);
                    seen_media.push(index);
                }
                MountNode::Video { frame: None, .. } | MountNode::Canvas { frame: None, .. } => {}
                MountNode::Viewport { surface } => {
                    if let Some(id) = self.viewport_texture(*surface, render_state) {
                        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                        painter.image(id, rect, uv, Color32::WHITE);
                        viewport_drawn = true;
                    }
                }
                MountNode::Gizmo { wireframe } => actions.extend(gizmo(ui, rect, *wireframe)),
                MountNode::Loading { label } => centered(&painter, rect, label, HUD, 14.0),
                MountNode::Placeholder { title, hint } => {
                    let c = rect.center();
                    painter.text(c - Vec2::new(0.0, 12.0), Align2::CENTER_CENTER, title, FontId::monospace(18.0), ACCENT);
                    painter.text(c + Vec2::new(0.0, 14.0), Align2::CENTER_CENTER, hint, FontId::proportional(13.0), DIM);
                }
            }
        }

        self.media.retain(|index, _| seen_media.contains(index));
        if !viewport_drawn {
            self.release_viewport(render_state);
        }
        actions
    }

    fn paint_media(&mut self, ui: &Ui, painter: &egui::Painter, rect: Rect, index: usize, pixels: &Arc<RgbaImage>) {
        let tag = Arc::as_ptr(pixels) as usize;
        let size = [pixels.width() as usize, pixels.height() as usize];
        let stale = self.media.get(&index).is_none_or(|(t, _)| *t != tag);
        if stale {
            let image = ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
            match self.media.get_mut(&index) {
                Some((t, handle)) => {
                    handle.set(image, egui::TextureOptions::LINEAR);
                    *t = tag;
                }
                None => {
                    let handle = ui.ctx().load_texture(format!("mount-{index}"), image, egui::TextureOptions::LINEAR);
                    self.media.insert(index, (tag, handle));
                }
            }
        }
        if let Some((_, handle)) = self.media.get(&index) {
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.image(handle.id(), contain(rect, size), uv, Color32::WHITE);
        }
    }

    fn viewport_texture(
        &mut self,
        surface: SurfaceId,
        render_state: Option<&egui_wgpu::RenderState>,
    ) -> Option<egui::TextureId> {
        let render_state = render_state?;
        let entry = self.registry.get(surface)?;
        if let Some((s, revision, id)) = self.viewport {
            if s == surface && revision == entry.revision {
                return Some(id);
            }
        }
        let mut renderer = render_state.renderer.write();
        if let Some((_, _, old)) = self.viewport.take() {
            renderer.free_texture(&old);
        }
        let id = renderer.register_native_texture(&render_state.device, &entry.view, wgpu::FilterMode::Linear);
        self.viewport = Some((surface, entry.revision, id));
        Some(id)
    }

    fn release_viewport(&mut self, render_state: Option<&egui_wgpu::RenderState>) {
        if let (Some((_, _, id)), Some(rs)) = (self.viewport.as_ref(), render_state) {
            rs.renderer.write().free_texture(id);
            self.viewport = None;
        }
    }
}

fn pointer_button(button: egui::PointerButton) -> PointerButton {
    match button {
        egui::PointerButton::Secondary => PointerButton::Secondary,
        egui::PointerButton::Middle => PointerButton::Middle,
        _ => PointerButton::Primary,
    }
}

fn paint_backdrop(painter: &egui::Painter, rect: Rect) {
    let stroke = Stroke::new(1.0, GRID);
    let mut x = rect.left();
    while x <= rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += GRID_STEP;
    }
    let mut y = rect.top();
    while y <= rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += GRID_STEP;
    }
    let font = FontId::monospace(11.0);
    painter.text(rect.left_top() + Vec2::new(8.0, 8.0), Align2::LEFT_TOP, HUD_TOP_LEFT, font.clone(), HUD);
    painter.text(rect.right_bottom() - Vec2::new(8.0, 8.0), Align2::RIGHT_BOTTOM, HUD_BOTTOM_RIGHT, font, HUD);
}

fn centered(painter: &egui::Painter, rect: Rect, text: &str, color: Color32, size: f32) {
    painter.text(rect.center(), Align2::CENTER_CENTER, text, FontId::monospace(size), color);
}

/// Largest rect with the image's aspect ratio that fits inside `rect`.
fn contain(rect: Rect, [w, h]: [usize; 2]) -> Rect {
    if w == 0 || h == 0 {
        return rect;
    }
    let scale = (rect.width() / w as f32).min(rect.height() / h as f32);
    Rect::from_center_size(rect.center(), Vec2::new(w as f32 * scale, h as f32 * scale))
}

/// Preset-view buttons in the top-right corner. Returns the clicked actions.
fn gizmo(ui: &mut Ui, rect: Rect, wireframe: bool) -> Vec<GizmoAction> {
    const CELL: Vec2 = Vec2::new(58.0, 22.0);
    const GAP: f32 = 6.0;
    let origin = Pos2::new(rect.right() - 8.0 - 3.0 * CELL.x - 2.0 * GAP, rect.top() + 30.0);
    let cell = |col: f32, row: f32| {
        Rect::from_min_size(origin + Vec2::new(col * (CELL.x + GAP), row * (CELL.y + GAP)), CELL)
    };

    let layout = [
        (CameraView::Top, cell(1.0, 0.0)),
        (CameraView::Left, cell(0.0, 1.0)),
        (CameraView::Front, cell(1.0, 1.0)),
        (CameraView::Right, cell(2.0, 1.0)),
        (CameraView::Bottom, cell(1.0, 2.0)),
        (CameraView::Back, cell(1.0, 3.0)),
        (CameraView::Iso, cell(2.0, 3.0)),
    ];

    let mut actions = Vec::new();
    for (view, at) in layout {
        let label = egui::RichText::new(view.label()).monospace().size(11.0).color(HUD);
        if ui.put(at, egui::Button::new(label)).clicked() {
            actions.push(GizmoAction::View(view));
        }
    }
    let wire = Rect::from_min_size(cell(1.0, 4.0).min, Vec2::new(2.0 * CELL.x + GAP, CELL.y));
    let color = if wireframe { ACCENT } else { HUD };
    let label = egui::RichText::new("Wireframe").monospace().size(11.0).color(color);
    if ui.put(wire, egui::Button::new(label).selected(wireframe)).clicked() {
        actions.push(GizmoAction::Wireframe);
    }
    actions
}
