//! Perspective camera, preset views and model framing.

use glam::{Mat4, Vec3};

use super::CameraFrame;
use crate::util::Bounds;

/// Framing distance as a multiple of the largest model extent.
pub const FRAMING_FACTOR: f32 = 1.8;

const DEFAULT_FOV_DEG: f32 = 45.0;
const DEFAULT_NEAR: f32 = 0.1;
const DEFAULT_FAR: f32 = 2000.0;

/// Named camera presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraView {
    Top,
    Bottom,
    Front,
    Back,
    Left,
    Right,
    Iso,
}

impl CameraView {
    pub const ALL: [CameraView; 7] = [
        CameraView::Top,
        CameraView::Left,
        CameraView::Front,
        CameraView::Right,
        CameraView::Bottom,
        CameraView::Back,
        CameraView::Iso,
    ];

    /// Direction from the target to the camera, scaled by the framing distance.
    ///
    /// The isometric direction is not normalized.
    pub fn direction(self) -> Vec3 {
        match self {
            Self::Top => Vec3::Y,
            Self::Bottom => Vec3::NEG_Y,
            Self::Front => Vec3::Z,
            Self::Back => Vec3::NEG_Z,
            Self::Left => Vec3::NEG_X,
            Self::Right => Vec3::X,
            Self::Iso => Vec3::new(0.4, 0.55, 1.0),
        }
    }

    /// Camera up vector; looking straight down or up needs a horizontal one.
    pub fn up(self) -> Vec3 {
        match self {
            Self::Top => Vec3::NEG_Z,
            Self::Bottom => Vec3::Z,
            _ => Vec3::Y,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Top => "TOP",
            Self::Bottom => "BOTTOM",
            Self::Front => "FRONT",
            Self::Back => "BACK",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Iso => "ISO",
        }
    }
}

/// Where the camera sits relative to a centered model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Original bounds center; the mesh is translated by its negation.
    pub center: Vec3,
    pub distance: f32,
}

impl Framing {
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let max_dim = bounds.extent().max_element();
        let max_dim = if max_dim.is_finite() && max_dim > 0.0 { max_dim } else { 1.0 };
        Self { center: bounds.center(), distance: max_dim * FRAMING_FACTOR }
    }

    pub fn eye(&self, view: CameraView) -> Vec3 {
        view.direction() * self.distance
    }

    /// Far plane that keeps large models inside the frustum.
    pub fn far(&self) -> f32 {
        DEFAULT_FAR.max(self.distance * 10.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub up: Vec3,
    /// Vertical FOV in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl PerspectiveCamera {
    pub fn new(aspect: f32, far: f32) -> Self {
        Self {
            position: Vec3::Z,
            up: Vec3::Y,
            fov: DEFAULT_FOV_DEG,
            near: DEFAULT_NEAR,
            far,
            aspect: aspect.max(f32::EPSILON),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view_matrix(&self, target: Vec3) -> Mat4 {
        Mat4::look_at_rh(self.position, target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn frame(&self, target: Vec3) -> CameraFrame {
        CameraFrame {
            view: self.view_matrix(target),
            projection: self.projection_matrix(),
            eye: self.position,
        }
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_FAR)
    }
}
