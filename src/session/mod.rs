//! Asset session lifecycle.
//!
//! The [`SessionManager`] owns the preview [`MountSurface`] and at most one
//! live [`AssetSession`]. On every selection change it disposes the previous
//! session synchronously, then starts the strategy matching the item's asset
//! type. Asynchronous work is guarded by selection tokens so a stale result
//! never touches the mount or the renderer.

mod manager;
mod media;
mod mount;
mod sequence;
mod still;
mod video;
mod worker;

pub mod model;

pub use manager::SessionManager;
pub use media::{decode_image, AssetSource, FsSource};
pub use model::{
    CameraFrame, CameraView, ControlsConfig, Engine, GeometryLoader, KitCell, LightRig, MaterialParams, Mesh,
    ModelSession, ModelState, RenderKit, SceneRenderer, StlLoader,
};
pub use mount::{
    ListenerId, ListenerKind, MountNode, MountSurface, NodeId, SurfaceId, SurfaceSize, HUD_BOTTOM_RIGHT,
    HUD_TOP_LEFT,
};
pub use sequence::SequenceSession;
pub use still::ImageSession;
pub use video::{FfmpegDecoder, FrameStream, VideoDecoder, VideoSession};
pub use worker::{Job, JobPoll};

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;

use crate::token::SelectionToken;
use crate::util::Result;

/// How often pending background results are polled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Placeholder title and hint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub hint: &'static str,
}

impl Notice {
    pub fn show(self, mount: &mut MountSurface) -> NodeId {
        mount.show_placeholder(self.title, self.hint)
    }
}

pub const NO_ASSET: Notice = Notice { title: "NO ASSET CONFIGURED", hint: "Set asset.type and asset source fields." };
pub const SEQUENCE_MISCONFIGURED: Notice =
    Notice { title: "PNG SEQ MISCONFIGURED", hint: "Asset needs base and count fields." };
pub const VIDEO_ERROR: Notice = Notice { title: "MEDIA ERROR", hint: "Video file missing or unsupported." };
pub const IMAGE_ERROR: Notice = Notice { title: "MEDIA ERROR", hint: "Image file missing or unsupported." };
pub const MODEL_UNAVAILABLE: Notice =
    Notice { title: "STL VIEWER UNAVAILABLE", hint: "Check STL path and render backend availability." };
pub const NO_RESULTS: Notice = Notice { title: "NO RESULTS", hint: "Adjust filter or add content." };
pub const NO_COLLECTIONS: Notice = Notice { title: "NO COLLECTIONS", hint: "Define collections in the catalog data file." };

/// Host repaint request returned from `tick` and `dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Nothing to do until the next input event.
    Idle,
    /// Repaint on the next frame.
    Animate,
    /// Repaint after a delay.
    After(Duration),
}

impl FrameRequest {
    /// Combine two requests, keeping the most urgent.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Animate, _) | (_, Self::Animate) => Self::Animate,
            (Self::After(a), Self::After(b)) => Self::After(a.min(b)),
            (Self::After(d), Self::Idle) | (Self::Idle, Self::After(d)) => Self::After(d),
            (Self::Idle, Self::Idle) => Self::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAction {
    View(CameraView),
    Wireframe,
}

/// Input forwarded by the host, in pane-local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    PointerDown { button: PointerButton, pos: Vec2 },
    PointerMove { pos: Vec2 },
    PointerUp { button: PointerButton },
    /// Positive delta scrolls down (zooms out).
    Wheel { delta: f32 },
    Click,
    Resize { size: SurfaceSize },
    Gizmo(GizmoAction),
}

impl SurfaceEvent {
    pub fn listener_kind(&self) -> ListenerKind {
        match self {
            Self::PointerDown { .. } | Self::PointerMove { .. } | Self::PointerUp { .. } => ListenerKind::Pointer,
            Self::Wheel { .. } => ListenerKind::Wheel,
            Self::Click => ListenerKind::Click,
            Self::Resize { .. } => ListenerKind::Resize,
            Self::Gizmo(_) => ListenerKind::Gizmo,
        }
    }
}

/// Live resources for one displayed asset.
pub trait AssetSession {
    /// Asset type label for logs.
    fn kind(&self) -> &'static str;

    fn token(&self) -> SelectionToken;

    /// Advance the session. `now` is monotonic host time.
    fn tick(&mut self, now: Duration, mount: &mut MountSurface) -> FrameRequest;

    fn handle_event(&mut self, _event: &SurfaceEvent, _mount: &mut MountSurface) -> FrameRequest {
        FrameRequest::Idle
    }

    /// Playback state for sessions that have one.
    fn playing(&self) -> Option<bool> {
        None
    }

    /// Pause or resume when the pane visibility changes.
    fn set_paused(&mut self, _paused: bool, _mount: &mut MountSurface) {}

    /// Release everything the session holds. Calling it again is a no-op.
    fn dispose(&mut self, mount: &mut MountSurface) -> Result<()>;
}

/// Told about every session start and disposal.
pub trait SessionObserver: Send + Sync {
    fn started(&self, kind: &'static str, token: SelectionToken);
    fn disposed(&self, kind: &'static str, token: SelectionToken);
}

/// Shared collaborators handed to every strategy.
#[derive(Clone)]
pub struct SessionEnv {
    pub source: Arc<dyn AssetSource>,
    pub kit: Arc<KitCell>,
    pub video: Arc<dyn VideoDecoder>,
    pub controls: ControlsConfig,
    pub observer: Option<Arc<dyn SessionObserver>>,
}

impl SessionEnv {
    pub fn new(source: Arc<dyn AssetSource>, kit: Arc<KitCell>, video: Arc<dyn VideoDecoder>) -> Self {
        Self {
            source,
            kit,
            video,
            controls: ControlsConfig::default(),
            observer: None,
        }
    }

    pub fn with_controls(mut self, controls: ControlsConfig) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_request_merge() {
        let short = FrameRequest::After(Duration::from_millis(10));
        let long = FrameRequest::After(Duration::from_millis(80));
        assert_eq!(FrameRequest::Idle.merge(FrameRequest::Idle), FrameRequest::Idle);
        assert_eq!(long.merge(short), short);
        assert_eq!(FrameRequest::Idle.merge(long), long);
        assert_eq!(short.merge(FrameRequest::Animate), FrameRequest::Animate);
    }

    #[test]
    fn test_listener_kinds() {
        let down = SurfaceEvent::PointerDown { button: PointerButton::Primary, pos: Vec2::ZERO };
        assert_eq!(down.listener_kind(), ListenerKind::Pointer);
        assert_eq!(SurfaceEvent::Wheel { delta: 1.0 }.listener_kind(), ListenerKind::Wheel);
        assert_eq!(SurfaceEvent::Gizmo(GizmoAction::Wireframe).listener_kind(), ListenerKind::Gizmo);
    }
}
