//! Trackball camera controls.
//!
//! Rotation follows the virtual-trackball model: pointer motion is mapped to
//! a circle normalized by half the viewport width, and the eye vector rotates
//! about the axis perpendicular to the motion. Moves are static (no damping):
//! each `update` consumes exactly the motion since the previous one.

use glam::{Quat, Vec2, Vec3};
use smallvec::{smallvec, SmallVec};

use super::PerspectiveCamera;
use crate::session::{PointerButton, SurfaceSize};

/// Wheel delta (pixels) to zoom units.
const WHEEL_SCALE: f32 = 0.00025;
const MOVE_EPS: f32 = 1e-6;
const MIN_DISTANCE: f32 = 1e-4;

/// Control speeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlsConfig {
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self { rotate_speed: 4.2, pan_speed: 0.9, zoom_speed: 1.15 }
    }
}

/// Interaction boundaries reported to the render scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Start,
    End,
}

pub type ControlEvents = SmallVec<[ControlEvent; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Zoom,
    Pan,
}

#[derive(Debug, Clone)]
pub struct TrackballControls {
    pub target: Vec3,
    config: ControlsConfig,
    screen: SurfaceSize,
    drag: Drag,
    move_prev: Vec2,
    move_curr: Vec2,
    zoom_start: Vec2,
    zoom_end: Vec2,
    pan_start: Vec2,
    pan_end: Vec2,
    enabled: bool,
}

impl TrackballControls {
    pub fn new(config: ControlsConfig, screen: SurfaceSize) -> Self {
        Self {
            target: Vec3::ZERO,
            config,
            screen: screen.clamped(),
            drag: Drag::None,
            move_prev: Vec2::ZERO,
            move_curr: Vec2::ZERO,
            zoom_start: Vec2::ZERO,
            zoom_end: Vec2::ZERO,
            pan_start: Vec2::ZERO,
            pan_end: Vec2::ZERO,
            enabled: true,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag != Drag::None
    }

    /// Viewport size used for pointer normalization.
    pub fn handle_resize(&mut self, screen: SurfaceSize) {
        self.screen = screen.clamped();
    }

    pub fn pointer_down(&mut self, button: PointerButton, pos: Vec2) -> ControlEvents {
        if !self.enabled || self.drag != Drag::None {
            return SmallVec::new();
        }
        match button {
            PointerButton::Primary => {
                self.drag = Drag::Rotate;
                self.move_curr = self.on_circle(pos);
                self.move_prev = self.move_curr;
            }
            PointerButton::Middle => {
                self.drag = Drag::Zoom;
                self.zoom_start = self.on_screen(pos);
                self.zoom_end = self.zoom_start;
            }
            PointerButton::Secondary => {
                self.drag = Drag::Pan;
                self.pan_start = self.on_screen(pos);
                self.pan_end = self.pan_start;
            }
        }
        smallvec![ControlEvent::Start]
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        if !self.enabled {
            return;
        }
        match self.drag {
            Drag::Rotate => {
                self.move_prev = self.move_curr;
                self.move_curr = self.on_circle(pos);
            }
            Drag::Zoom => self.zoom_end = self.on_screen(pos),
            Drag::Pan => self.pan_end = self.on_screen(pos),
            Drag::None => {}
        }
    }

    pub fn pointer_up(&mut self) -> ControlEvents {
        if self.drag == Drag::None {
            return SmallVec::new();
        }
        self.drag = Drag::None;
        smallvec![ControlEvent::End]
    }

    /// Wheel zoom; positive delta zooms out. Reported as a complete interaction,
    /// unless a drag is running, in which case the drag's loop applies it.
    pub fn wheel(&mut self, delta: f32) -> ControlEvents {
        if !self.enabled || delta == 0.0 || !delta.is_finite() {
            return SmallVec::new();
        }
        self.zoom_start.y -= delta * WHEEL_SCALE;
        if self.is_dragging() {
            return SmallVec::new();
        }
        smallvec![ControlEvent::Start, ControlEvent::End]
    }

    /// Apply pending motion to the camera and aim it at the target.
    /// Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let before = camera.position;
        let mut eye = camera.position - self.target;

        self.rotate(&mut eye, camera);
        self.zoom(&mut eye);
        self.pan(&mut eye, camera);

        if eye.length() < MIN_DISTANCE {
            eye = eye.normalize_or(Vec3::Z) * MIN_DISTANCE;
        }
        camera.position = self.target + eye;
        camera.position.distance_squared(before) > MOVE_EPS
    }

    /// Drop pending motion, for camera jumps that bypass the controls.
    pub fn reset_motion(&mut self) {
        self.move_prev = self.move_curr;
        self.zoom_start = self.zoom_end;
        self.pan_start = self.pan_end;
    }

    /// Stop reacting to input.
    pub fn dispose(&mut self) {
        self.enabled = false;
        self.drag = Drag::None;
        self.reset_motion();
    }

    fn rotate(&mut self, eye: &mut Vec3, camera: &mut PerspectiveCamera) {
        let delta = self.move_curr - self.move_prev;
        let angle = delta.length();
        if angle > 0.0 {
            let eye_dir = eye.normalize_or_zero();
            let up = camera.up.normalize_or_zero();
            let sideways = up.cross(eye_dir).normalize_or_zero();
            let move_dir = up * delta.y + sideways * delta.x;
            let axis = move_dir.cross(*eye).normalize_or_zero();
            if axis != Vec3::ZERO {
                let q = Quat::from_axis_angle(axis, angle * self.config.rotate_speed);
                *eye = q * *eye;
                camera.up = q * camera.up;
            }
        }
        self.move_prev = self.move_curr;
    }

    fn zoom(&mut self, eye: &mut Vec3) {
        let factor = 1.0 + (self.zoom_end.y - self.zoom_start.y) * self.config.zoom_speed;
        if factor != 1.0 && factor > 0.0 {
            *eye *= factor;
        }
        self.zoom_start = self.zoom_end;
    }

    fn pan(&mut self, eye: &mut Vec3, camera: &mut PerspectiveCamera) {
        let change = self.pan_end - self.pan_start;
        if change.length_squared() > 0.0 {
            let change = change * eye.length() * self.config.pan_speed;
            let pan = eye.cross(camera.up).normalize_or_zero() * change.x
                + camera.up.normalize_or_zero() * change.y;
            camera.position += pan;
            self.target += pan;
        }
        self.pan_start = self.pan_end;
    }

    /// Pointer on the trackball circle: x and y in half-widths, y up.
    fn on_circle(&self, pos: Vec2) -> Vec2 {
        let half_w = self.screen.width as f32 * 0.5;
        Vec2::new(
            (pos.x - half_w) / half_w,
            (self.screen.height as f32 - 2.0 * pos.y) / self.screen.width as f32,
        )
    }

    /// Pointer in `0..1` screen units, y down.
    fn on_screen(&self, pos: Vec2) -> Vec2 {
        Vec2::new(pos.x / self.screen.width as f32, pos.y / self.screen.height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TrackballControls, PerspectiveCamera) {
        let controls = TrackballControls::new(ControlsConfig::default(), SurfaceSize::new(800, 600));
        let mut camera = PerspectiveCamera::default();
        camera.position = Vec3::new(0.0, 0.0, 10.0);
        (controls, camera)
    }

    #[test]
    fn test_drag_events() {
        let (mut c, _) = setup();
        assert_eq!(c.pointer_down(PointerButton::Primary, Vec2::new(400.0, 300.0)).as_slice(), &[ControlEvent::Start]);
        assert!(c.is_dragging());
        // A second button while dragging is ignored.
        assert!(c.pointer_down(PointerButton::Secondary, Vec2::ZERO).is_empty());
        assert_eq!(c.pointer_up().as_slice(), &[ControlEvent::End]);
        assert!(c.pointer_up().is_empty());
    }

    #[test]
    fn test_rotate_keeps_distance() {
        let (mut c, mut cam) = setup();
        c.pointer_down(PointerButton::Primary, Vec2::new(400.0, 300.0));
        c.pointer_move(Vec2::new(440.0, 300.0));
        assert!(c.update(&mut cam));
        assert!((cam.position.length() - 10.0).abs() < 1e-3);
        // Dragging right swings the camera to the left of the target.
        assert!(cam.position.x < 0.0);
        // Motion is consumed.
        assert!(!c.update(&mut cam));
    }

    #[test]
    fn test_wheel_zoom() {
        let (mut c, mut cam) = setup();
        let events = c.wheel(100.0);
        assert_eq!(events.as_slice(), &[ControlEvent::Start, ControlEvent::End]);
        c.update(&mut cam);
        let expected = 10.0 * (1.0 + 100.0 * WHEEL_SCALE * 1.15);
        assert!((cam.position.z - expected).abs() < 1e-4);

        c.wheel(-100.0);
        c.update(&mut cam);
        assert!(cam.position.z < expected);
    }

    #[test]
    fn test_wheel_during_drag_keeps_interaction() {
        let (mut c, mut cam) = setup();
        c.pointer_down(PointerButton::Primary, Vec2::new(400.0, 300.0));
        assert!(c.wheel(100.0).is_empty());
        assert!(c.is_dragging());
        c.update(&mut cam);
        assert!(cam.position.length() > 10.0);
        assert_eq!(c.pointer_up().as_slice(), &[ControlEvent::End]);
    }

    #[test]
    fn test_pan_moves_target() {
        let (mut c, mut cam) = setup();
        c.pointer_down(PointerButton::Secondary, Vec2::new(400.0, 300.0));
        c.pointer_move(Vec2::new(480.0, 300.0));
        c.update(&mut cam);
        assert!(c.target.x < 0.0);
        assert!((cam.position - c.target - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-4);
    }

    #[test]
    fn test_disposed_controls_ignore_input() {
        let (mut c, mut cam) = setup();
        c.dispose();
        assert!(c.pointer_down(PointerButton::Primary, Vec2::ZERO).is_empty());
        assert!(c.wheel(10.0).is_empty());
        assert!(!c.update(&mut cam));
    }
}
