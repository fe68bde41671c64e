//! Render kit: the engine and geometry loader shared by model sessions.
//!
//! The kit is expensive to build (shader compilation, pipeline creation), so
//! one [`KitCell`] per host caches it. `ensure()` initializes under a lock at
//! most once; a failed initialization is not cached and can be retried.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use crate::session::{SurfaceId, SurfaceSize};
use crate::util::{Bounds, Error, Result};

/// Non-indexed triangle list with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.positions.iter().copied())
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }
}

/// Surface shading parameters. Colors are sRGB in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub wireframe: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            color: hex_color(0x7cefa1),
            metalness: 0.08,
            roughness: 0.65,
            wireframe: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    /// Position for directional lights (pointing at the origin); unused for ambient.
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: Light,
    pub key: Light,
    pub fill: Light,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient: Light { color: hex_color(0x8fd8aa), intensity: 0.85, position: Vec3::ZERO },
            key: Light { color: Vec3::ONE, intensity: 0.8, position: Vec3::new(80.0, 100.0, 60.0) },
            fill: Light { color: hex_color(0x82ffb1), intensity: 0.55, position: Vec3::new(-70.0, -40.0, -50.0) },
        }
    }
}

/// Camera state for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

impl CameraFrame {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// `0xRRGGBB` to an sRGB color vector.
pub fn hex_color(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

/// Parses geometry bytes into a [`Mesh`].
pub trait GeometryLoader: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Mesh>;
}

/// Creates per-session scene renderers.
pub trait Engine: Send + Sync {
    fn create_scene(&self, size: SurfaceSize) -> Result<Box<dyn SceneRenderer>>;
}

/// GPU resources for one model session.
///
/// Each `release_*` call frees one resource group and must tolerate being
/// called when that group is already gone.
pub trait SceneRenderer {
    fn surface(&self) -> SurfaceId;
    fn upload_geometry(&mut self, mesh: &Mesh) -> Result<()>;
    fn set_material(&mut self, material: &MaterialParams) -> Result<()>;
    fn set_lights(&mut self, lights: &LightRig);
    fn resize(&mut self, size: SurfaceSize);
    fn render(&mut self, camera: &CameraFrame) -> Result<()>;
    fn release_geometry(&mut self);
    fn release_material(&mut self);
    fn release_surface(&mut self);
}

pub struct RenderKit {
    pub engine: Arc<dyn Engine>,
    pub loader: Arc<dyn GeometryLoader>,
}

impl fmt::Debug for RenderKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderKit").finish_non_exhaustive()
    }
}

type KitFactory = Box<dyn Fn() -> Result<RenderKit> + Send + Sync>;

/// Lazily initialized, process-wide render kit.
pub struct KitCell {
    slot: Mutex<Option<Arc<RenderKit>>>,
    factory: KitFactory,
    inits: AtomicUsize,
}

impl KitCell {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<RenderKit> + Send + Sync + 'static,
    {
        Self {
            slot: Mutex::new(None),
            factory: Box::new(factory),
            inits: AtomicUsize::new(0),
        }
    }

    /// A cell whose initialization always fails, for hosts without a renderer.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(Error::engine(reason.clone())))
    }

    /// Return the kit, building it on first use.
    pub fn ensure(&self) -> Result<Arc<RenderKit>> {
        let mut slot = self.slot.lock();
        if let Some(kit) = slot.as_ref() {
            return Ok(Arc::clone(kit));
        }
        let kit = Arc::new((self.factory)()?);
        self.inits.fetch_add(1, Ordering::Relaxed);
        tracing::info!("render kit initialized");
        *slot = Some(Arc::clone(&kit));
        Ok(kit)
    }

    /// The kit if it has been built.
    pub fn get(&self) -> Option<Arc<RenderKit>> {
        self.slot.lock().clone()
    }

    /// Number of successful initializations.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for KitCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitCell").field("inits", &self.init_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StlLoader;
    use std::sync::atomic::AtomicBool;

    struct NoEngine;

    impl Engine for NoEngine {
        fn create_scene(&self, _size: SurfaceSize) -> Result<Box<dyn SceneRenderer>> {
            Err(Error::engine("headless"))
        }
    }

    fn kit() -> Result<RenderKit> {
        Ok(RenderKit { engine: Arc::new(NoEngine), loader: Arc::new(StlLoader) })
    }

    #[test]
    fn test_ensure_initializes_once() {
        let cell = Arc::new(KitCell::new(kit));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || cell.ensure().map(|_| ()))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(cell.init_count(), 1);
        assert!(Arc::ptr_eq(&cell.ensure().unwrap(), &cell.get().unwrap()));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let fail = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&fail);
        let cell = KitCell::new(move || {
            if flag.load(Ordering::SeqCst) {
                Err(Error::engine("no adapter"))
            } else {
                kit()
            }
        });
        assert!(cell.ensure().is_err());
        assert!(cell.get().is_none());
        fail.store(false, Ordering::SeqCst);
        assert!(cell.ensure().is_ok());
        assert_eq!(cell.init_count(), 1);
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color(0xff0000), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hex_color(0x000000), Vec3::ZERO);
    }

    #[test]
    fn test_mesh_translate() {
        let mut mesh = Mesh {
            positions: vec![Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 1.0, 1.0), Vec3::new(1.0, 5.0, 1.0)],
            normals: vec![Vec3::Z; 3],
        };
        let c = mesh.bounds().center();
        mesh.translate(-c);
        assert_eq!(mesh.bounds().center(), Vec3::ZERO);
        assert_eq!(mesh.triangle_count(), 1);
    }
}
