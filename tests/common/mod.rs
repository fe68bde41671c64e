//! Shared fixtures: recording render engine, gated asset source, fake video.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use glam::Vec3;
use image::{ImageFormat, Rgba, RgbaImage};

use monospec::catalog::{normalize, Catalog, Item};
use monospec::session::{
    AssetSource, CameraFrame, Engine, FrameStream, FsSource, KitCell, LightRig, MaterialParams, Mesh, MountNode,
    RenderKit, SceneRenderer, SessionEnv, SessionManager, SessionObserver, StlLoader, SurfaceId, SurfaceSize,
    VideoDecoder,
};
use monospec::token::SelectionToken;
use monospec::Result;

// ---- render engine ----

/// Everything the recording engine was asked to do, in order.
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Vec<String>>,
    eyes: Mutex<Vec<Vec3>>,
    next_surface: AtomicU64,
    pub fail_upload: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn renders(&self) -> usize {
        self.count("render")
    }

    pub fn last_eye(&self) -> Option<Vec3> {
        self.eyes.lock().unwrap().last().copied()
    }
}

pub struct RecordingEngine {
    rec: Arc<Recorder>,
}

impl Engine for RecordingEngine {
    fn create_scene(&self, size: SurfaceSize) -> Result<Box<dyn SceneRenderer>> {
        let id = self.rec.next_surface.fetch_add(1, Ordering::SeqCst) + 1;
        self.rec.push(format!("create {}x{}", size.width, size.height));
        Ok(Box::new(RecordingScene { rec: Arc::clone(&self.rec), surface: SurfaceId(id) }))
    }
}

pub struct RecordingScene {
    rec: Arc<Recorder>,
    surface: SurfaceId,
}

impl SceneRenderer for RecordingScene {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn upload_geometry(&mut self, _mesh: &Mesh) -> Result<()> {
        if self.rec.fail_upload.load(Ordering::SeqCst) {
            self.rec.push("upload failed");
            return Err(monospec::Error::engine("out of memory"));
        }
        self.rec.push("upload");
        Ok(())
    }

    fn set_material(&mut self, material: &MaterialParams) -> Result<()> {
        self.rec.push(if material.wireframe { "material wire" } else { "material" });
        Ok(())
    }

    fn set_lights(&mut self, _lights: &LightRig) {
        self.rec.push("lights");
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.rec.push(format!("resize {}x{}", size.width, size.height));
    }

    fn render(&mut self, camera: &CameraFrame) -> Result<()> {
        self.rec.eyes.lock().unwrap().push(camera.eye);
        self.rec.push("render");
        Ok(())
    }

    fn release_geometry(&mut self) {
        self.rec.push("release_geometry");
    }

    fn release_material(&mut self) {
        self.rec.push("release_material");
    }

    fn release_surface(&mut self) {
        self.rec.push("release_surface");
    }
}

pub fn recording_kit(rec: &Arc<Recorder>) -> Arc<KitCell> {
    let rec = Arc::clone(rec);
    Arc::new(KitCell::new(move || {
        Ok(RenderKit {
            engine: Arc::new(RecordingEngine { rec: Arc::clone(&rec) }),
            loader: Arc::new(StlLoader),
        })
    }))
}

// ---- asset source ----

/// Filesystem source that blocks reads of one path until released.
pub struct GatedSource {
    inner: FsSource,
    gated: Mutex<Option<String>>,
    open: Mutex<bool>,
    cv: Condvar,
}

impl GatedSource {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: FsSource::new(root),
            gated: Mutex::new(None),
            open: Mutex::new(true),
            cv: Condvar::new(),
        })
    }

    /// Hold reads of `src` until [`GatedSource::release`].
    pub fn hold(&self, src: &str) {
        *self.gated.lock().unwrap() = Some(src.to_string());
        *self.open.lock().unwrap() = false;
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

impl AssetSource for GatedSource {
    fn read(&self, src: &str) -> Result<Vec<u8>> {
        let held = self.gated.lock().unwrap().as_deref() == Some(src);
        if held {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
        }
        self.inner.read(src)
    }

    fn locate(&self, src: &str) -> Result<PathBuf> {
        self.inner.locate(src)
    }
}

// ---- video ----

/// Endless stream of solid frames, one per millisecond.
pub struct FakeVideo {
    pub opened: AtomicU64,
}

impl FakeVideo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { opened: AtomicU64::new(0) })
    }
}

struct FakeStream {
    n: u8,
}

impl FrameStream for FakeStream {
    fn next_frame(&mut self) -> Result<Option<RgbaImage>> {
        std::thread::sleep(Duration::from_millis(1));
        self.n = self.n.wrapping_add(1);
        Ok(Some(RgbaImage::from_pixel(4, 4, Rgba([self.n, 0, 0, 255]))))
    }
}

impl VideoDecoder for FakeVideo {
    fn open(&self, _path: &Path) -> Result<Box<dyn FrameStream>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream { n: 0 }))
    }
}

// ---- observer ----

/// Counts live sessions and fails if two are ever live at once.
#[derive(Default)]
pub struct LiveCounter {
    live: AtomicI64,
    pub started: AtomicU64,
    pub disposed: AtomicU64,
    kinds: Mutex<Vec<(&'static str, SelectionToken)>>,
}

impl LiveCounter {
    pub fn live(&self) -> i64 {
        self.live.load(Ordering::SeqCst)
    }

    pub fn started_kinds(&self) -> Vec<&'static str> {
        self.kinds.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

impl SessionObserver for LiveCounter {
    fn started(&self, kind: &'static str, token: SelectionToken) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(live <= 1, "{live} sessions live after starting {kind} {token}");
        self.started.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().unwrap().push((kind, token));
    }

    fn disposed(&self, _kind: &'static str, _token: SelectionToken) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---- files ----

/// Encode a solid-color PNG.
pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

/// ASCII STL with two triangles spanning a 10-unit cube at `offset`.
pub fn cube_stl(offset: Vec3) -> String {
    let v = |x: f32, y: f32, z: f32| {
        let p = offset + Vec3::new(x, y, z);
        format!("      vertex {} {} {}\n", p.x, p.y, p.z)
    };
    let mut s = String::from("solid cube\n");
    for tri in [
        [(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (0.0, 10.0, 0.0)],
        [(0.0, 0.0, 10.0), (10.0, 10.0, 10.0), (0.0, 10.0, 10.0)],
    ] {
        s.push_str("  facet normal 0 0 1\n    outer loop\n");
        for (x, y, z) in tri {
            s.push_str(&v(x, y, z));
        }
        s.push_str("    endloop\n  endfacet\n");
    }
    s.push_str("endsolid cube\n");
    s
}

pub fn write(root: &Path, rel: &str, bytes: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

// ---- harness ----

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub source: Arc<GatedSource>,
    pub rec: Arc<Recorder>,
    pub video: Arc<FakeVideo>,
    pub counter: Arc<LiveCounter>,
    pub kit: Arc<KitCell>,
}

impl Harness {
    /// Temp catalog root with a cube model, a red image, a clip and a
    /// four-frame sequence (red, green, blue, white).
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "models/cube.stl", cube_stl(Vec3::ZERO));
        write(root, "models/far.stl", cube_stl(Vec3::new(100.0, 0.0, 0.0)));
        write(root, "models/broken.stl", "solid nothing here\nendsolid\n");
        write(root, "img/red.png", png(8, 4, [255, 0, 0, 255]));
        write(root, "video/clip.webm", b"not decoded by the fake");
        let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [255, 255, 255, 255]];
        for (i, c) in colors.iter().enumerate() {
            write(root, &format!("seq/spin_{:04}.png", i + 1), png(2, 2, *c));
        }

        let rec = Recorder::new();
        Self {
            source: GatedSource::new(root),
            kit: recording_kit(&rec),
            rec,
            video: FakeVideo::new(),
            counter: Arc::new(LiveCounter::default()),
            dir,
        }
    }

    pub fn env(&self) -> SessionEnv {
        SessionEnv::new(self.source.clone(), Arc::clone(&self.kit), self.video.clone())
            .with_observer(self.counter.clone())
    }

    pub fn manager(&self) -> SessionManager {
        SessionManager::new(self.env(), monospec::token::Generation::new(), SurfaceSize::new(400, 300))
    }
}

/// The catalog matching [`Harness::new`]'s files.
pub fn fixture_catalog() -> Catalog {
    normalize(&serde_json::json!({
        "collections": [
            {
                "id": "mixed",
                "name": "Mixed",
                "items": [
                    { "id": "CUBE", "name": "Cube", "tags": ["print"], "asset": { "type": "stl", "src": "models/cube.stl" } },
                    { "id": "RED", "name": "Red Card", "tags": ["flat"], "asset": { "type": "img", "src": "img/red.png" } },
                    { "id": "CLIP", "name": "Clip", "asset": { "type": "webm", "src": "video/clip.webm" } },
                    { "id": "SPIN", "name": "Spin", "asset": { "type": "pngseq", "base": "seq/spin_", "count": 4, "fps": 10 } },
                    { "id": "FAR", "name": "Offset Cube", "asset": { "type": "stl", "src": "models/far.stl" } },
                    { "id": "GONE", "name": "Missing Model", "asset": { "type": "stl", "src": "models/missing.stl" } },
                    { "id": "BAD", "name": "Broken Model", "asset": { "type": "stl", "src": "models/broken.stl" } },
                    { "id": "SEQ-BAD", "name": "No Count", "asset": { "type": "pngseq", "base": "seq/spin_" } },
                    { "id": "ODD", "name": "Odd", "asset": { "type": "hologram" } },
                    { "id": "NOCLIP", "name": "Lost Clip", "asset": { "type": "webm", "src": "video/none.webm" } },
                    { "id": "NOIMG", "name": "Lost Card", "asset": { "type": "img", "src": "img/none.png" } }
                ]
            },
            { "id": "empty", "name": "Empty" }
        ]
    }))
    .unwrap()
}

pub fn item(catalog: &Catalog, id: &str) -> Arc<Item> {
    catalog.items().find(|it| it.id == id).cloned().unwrap()
}

/// Tick until `done` holds, sleeping between ticks. Returns false on timeout.
pub fn pump(manager: &mut SessionManager, now: Duration, done: impl Fn(&SessionManager) -> bool) -> bool {
    for _ in 0..1000 {
        manager.tick(now);
        if done(manager) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

pub fn has_viewport(manager: &SessionManager) -> bool {
    manager.mount().viewport().is_some()
}

pub fn placeholder(manager: &SessionManager) -> Option<(String, String)> {
    manager.mount().placeholder().map(|(t, h)| (t.to_string(), h.to_string()))
}

/// Pixel at (0, 0) of the first canvas or image node with pixels.
pub fn shown_pixel(manager: &SessionManager) -> Option<[u8; 4]> {
    manager.mount().nodes().find_map(|n| match n {
        MountNode::Canvas { frame: Some(img), .. }
        | MountNode::Image { pixels: Some(img), .. }
        | MountNode::Video { frame: Some(img), .. } => Some(img.get_pixel(0, 0).0),
        _ => None,
    })
}
