//! Retained display list for the preview pane.
//!
//! Sessions mutate the [`MountSurface`]; the host draws its nodes every frame
//! and forwards input only for listener kinds that are currently registered.

use std::sync::Arc;

use image::RgbaImage;

/// Identifier of a render target owned by a scene renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Input kinds a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Pointer,
    Wheel,
    Click,
    Resize,
    Gizmo,
}

/// Width and height in pixels. Mount sizes are logical; render targets are physical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size with each side at least one pixel.
    pub fn clamped(self) -> Self {
        Self { width: self.width.max(1), height: self.height.max(1) }
    }

    pub fn aspect(self) -> f32 {
        let s = self.clamped();
        s.width as f32 / s.height as f32
    }
}

/// Static overlay labels drawn over the backdrop grid.
pub const HUD_TOP_LEFT: &str = "CAM: ROTOR FEED 01";
pub const HUD_BOTTOM_RIGHT: &str = "VIS CLR: ALPHA";

#[derive(Debug, Clone, PartialEq)]
pub enum MountNode {
    /// Grid background plus HUD labels.
    Backdrop,
    Image {
        src: String,
        alt: String,
        pixels: Option<Arc<RgbaImage>>,
    },
    Video {
        src: String,
        playing: bool,
        frame: Option<Arc<RgbaImage>>,
    },
    /// Frame-sequence canvas; sized from the first loaded frame.
    Canvas {
        size: Option<SurfaceSize>,
        frame: Option<Arc<RgbaImage>>,
    },
    /// Offscreen render target of a model session.
    Viewport { surface: SurfaceId },
    /// Preset-view buttons and wireframe toggle.
    Gizmo { wireframe: bool },
    Loading { label: String },
    Placeholder { title: String, hint: String },
}

impl MountNode {
    pub fn placeholder(title: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Placeholder { title: title.into(), hint: hint.into() }
    }
}

pub struct MountSurface {
    nodes: Vec<(NodeId, MountNode)>,
    listeners: Vec<(ListenerId, ListenerKind)>,
    next_id: u64,
    size: SurfaceSize,
    pixel_ratio: f32,
}

impl MountSurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            nodes: Vec::new(),
            listeners: Vec::new(),
            next_id: 0,
            size,
            pixel_ratio: 1.0,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Update the pane size. Returns true if it changed.
    pub fn set_size(&mut self, size: SurfaceSize) -> bool {
        let changed = self.size != size;
        self.size = size;
        changed
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
    }

    /// Render target size for a 3D viewport: pane size scaled by the pixel ratio.
    pub fn render_size(&self) -> SurfaceSize {
        let s = self.size.clamped();
        SurfaceSize::new(
            ((s.width as f32 * self.pixel_ratio).round() as u32).max(1),
            ((s.height as f32 * self.pixel_ratio).round() as u32).max(1),
        )
    }

    // ---- nodes ----

    pub fn nodes(&self) -> impl Iterator<Item = &MountNode> {
        self.nodes.iter().map(|(_, n)| n)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn append(&mut self, node: MountNode) -> NodeId {
        let id = NodeId(self.bump());
        self.nodes.push((id, node));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&MountNode> {
        self.nodes.iter().find(|(nid, _)| *nid == id).map(|(_, n)| n)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut MountNode> {
        self.nodes.iter_mut().find(|(nid, _)| *nid == id).map(|(_, n)| n)
    }

    /// Replace a node in place. Returns false if the node is gone.
    pub fn replace(&mut self, id: NodeId, node: MountNode) -> bool {
        match self.node_mut(id) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<MountNode> {
        let pos = self.nodes.iter().position(|(nid, _)| *nid == id)?;
        Some(self.nodes.remove(pos).1)
    }

    /// Remove every node. Listener registrations are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Clear the surface and show a placeholder in its place.
    pub fn show_placeholder(&mut self, title: &str, hint: &str) -> NodeId {
        self.clear();
        self.append(MountNode::placeholder(title, hint))
    }

    /// Title and hint of the placeholder being shown, if any.
    pub fn placeholder(&self) -> Option<(&str, &str)> {
        self.nodes().find_map(|n| match n {
            MountNode::Placeholder { title, hint } => Some((title.as_str(), hint.as_str())),
            _ => None,
        })
    }

    pub fn viewport(&self) -> Option<SurfaceId> {
        self.nodes().find_map(|n| match n {
            MountNode::Viewport { surface } => Some(*surface),
            _ => None,
        })
    }

    // ---- listeners ----

    pub fn listen(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.bump());
        self.listeners.push((id, kind));
        id
    }

    /// Returns false if the registration was already removed.
    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Whether events of this kind should be forwarded.
    pub fn routes(&self, kind: ListenerKind) -> bool {
        self.listeners.iter().any(|(_, k)| *k == kind)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every registration. Returns how many were removed.
    pub(crate) fn drop_listeners(&mut self) -> usize {
        let n = self.listeners.len();
        self.listeners.clear();
        n
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Default for MountSurface {
    fn default() -> Self {
        Self::new(SurfaceSize::new(640, 480))
    }
}
