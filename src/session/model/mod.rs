//! Interactive 3D model session (`stl`).
//!
//! States: `Loading -> Ready -> Idle <-> Interacting -> Disposed`, plus the
//! terminal `Halted` when loading failed or the result went stale. `Ready`
//! is transient: the camera is framed, one frame is rendered and the session
//! settles in `Idle`.

mod camera;
mod controls;
mod kit;
mod scheduler;
mod stl;

pub use camera::{CameraView, Framing, PerspectiveCamera, FRAMING_FACTOR};
pub use controls::{ControlEvent, ControlEvents, ControlsConfig, TrackballControls};
pub use kit::{
    hex_color, CameraFrame, Engine, GeometryLoader, KitCell, Light, LightRig, MaterialParams, Mesh, RenderKit,
    SceneRenderer,
};
pub use scheduler::{LoopState, RenderScheduler};
pub use stl::StlLoader;

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use smallvec::SmallVec;

use super::{
    AssetSession, FrameRequest, GizmoAction, Job, JobPoll, ListenerId, ListenerKind, MountNode, MountSurface,
    NodeId, SessionEnv, SurfaceEvent, SurfaceSize, MODEL_UNAVAILABLE, POLL_INTERVAL,
};
use crate::token::{Cancelable, SelectionToken, TokenWatch};
use crate::util::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Loading,
    Idle,
    Interacting,
    Halted,
    Disposed,
}

struct Loaded {
    kit: Arc<RenderKit>,
    mesh: Mesh,
}

type LoadResult = Cancelable<Result<Loaded>>;

/// Scene objects that exist once the model is ready.
struct Stage {
    renderer: Box<dyn SceneRenderer>,
    camera: PerspectiveCamera,
    controls: TrackballControls,
    framing: Framing,
    material: MaterialParams,
}

pub struct ModelSession {
    watch: TokenWatch,
    state: ModelState,
    config: ControlsConfig,
    job: Option<Job<LoadResult>>,
    loading: Option<NodeId>,
    viewport: Option<NodeId>,
    gizmo: Option<NodeId>,
    listeners: SmallVec<[ListenerId; 4]>,
    stage: Option<Stage>,
    scheduler: RenderScheduler,
    renders: u64,
}

impl ModelSession {
    /// Show a loading indicator and fetch the render kit and geometry in the background.
    pub fn start(src: &str, watch: TokenWatch, env: &SessionEnv, mount: &mut MountSurface) -> Result<Self> {
        let kit = Arc::clone(&env.kit);
        let source = Arc::clone(&env.source);
        let path = src.to_string();
        let job_watch = watch.clone();

        let job = Job::stream("monospec-model", move |tx| {
            let watch = job_watch;
            let _span = tracing::debug_span!("model_load", token = %watch.token(), src = %path).entered();
            let (kit, bytes) = rayon::join(|| kit.ensure(), || source.read(&path));
            if !watch.is_current() {
                tracing::debug!("selection changed before parse, dropping load");
                return;
            }
            let outcome = kit.and_then(|kit| {
                let mesh = kit.loader.parse(&bytes?)?;
                Ok(Loaded { kit, mesh })
            });
            let _ = tx.send(watch.guard(outcome));
        })?;

        let loading = mount.append(MountNode::Loading { label: "LOADING MODEL".into() });
        Ok(Self {
            watch,
            state: ModelState::Loading,
            config: env.controls,
            job: Some(job),
            loading: Some(loading),
            viewport: None,
            gizmo: None,
            listeners: SmallVec::new(),
            stage: None,
            scheduler: RenderScheduler::new(),
            renders: 0,
        })
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Frames rendered so far.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.stage.as_ref().map(|s| &s.camera)
    }

    pub fn framing(&self) -> Option<Framing> {
        self.stage.as_ref().map(|s| s.framing)
    }

    pub fn wireframe(&self) -> bool {
        self.stage.as_ref().is_some_and(|s| s.material.wireframe)
    }

    fn poll_load(&mut self, mount: &mut MountSurface) -> FrameRequest {
        let Some(job) = &self.job else {
            return FrameRequest::Idle;
        };
        match job.try_recv() {
            JobPoll::Pending => FrameRequest::After(POLL_INTERVAL),
            JobPoll::Ready(result) => {
                self.job = None;
                match result.resume() {
                    None => {
                        self.state = ModelState::Halted;
                    }
                    Some(Ok(loaded)) => {
                        if let Err(e) = self.ready(loaded, mount) {
                            self.halt(mount, &e);
                        }
                    }
                    Some(Err(e)) => self.halt(mount, &e),
                }
                self.scheduler.request()
            }
            JobPoll::Closed => {
                self.job = None;
                if self.watch.is_current() {
                    self.halt(mount, &Error::Worker("model loader exited without a result".into()));
                } else {
                    self.state = ModelState::Halted;
                }
                FrameRequest::Idle
            }
        }
    }

    fn ready(&mut self, loaded: Loaded, mount: &mut MountSurface) -> Result<()> {
        let Loaded { kit, mut mesh } = loaded;
        let framing = Framing::from_bounds(&mesh.bounds());
        mesh.translate(-framing.center);

        let material = MaterialParams::default();
        let mut renderer = kit.engine.create_scene(mount.render_size())?;
        let configured = renderer
            .upload_geometry(&mesh)
            .and_then(|()| renderer.set_material(&material));
        if let Err(e) = configured {
            renderer.release_geometry();
            renderer.release_material();
            renderer.release_surface();
            return Err(e);
        }
        renderer.set_lights(&LightRig::default());
        let surface = renderer.surface();

        self.stage = Some(Stage {
            renderer,
            camera: PerspectiveCamera::new(mount.size().aspect(), framing.far()),
            controls: TrackballControls::new(self.config, mount.size()),
            framing,
            material,
        });
        for kind in [ListenerKind::Pointer, ListenerKind::Wheel, ListenerKind::Resize, ListenerKind::Gizmo] {
            self.listeners.push(mount.listen(kind));
        }

        let viewport = MountNode::Viewport { surface };
        match self.loading.take() {
            Some(id) if mount.replace(id, viewport.clone()) => self.viewport = Some(id),
            _ => self.viewport = Some(mount.append(viewport)),
        }
        self.gizmo = Some(mount.append(MountNode::Gizmo { wireframe: false }));

        tracing::debug!(
            token = %self.watch.token(),
            triangles = mesh.triangle_count(),
            distance = framing.distance,
            "model ready"
        );
        self.state = ModelState::Idle;
        self.set_view(CameraView::Iso);
        Ok(())
    }

    fn halt(&mut self, mount: &mut MountSurface, error: &Error) {
        tracing::warn!(token = %self.watch.token(), error = %error, "model viewer unavailable");
        self.state = ModelState::Halted;
        self.loading = None;
        MODEL_UNAVAILABLE.show(mount);
    }

    fn render_now(&mut self) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        let frame = stage.camera.frame(stage.controls.target);
        match stage.renderer.render(&frame) {
            Ok(()) => self.renders += 1,
            Err(e) => tracing::warn!(error = %e, "model render failed"),
        }
    }

    /// Jump to a preset view around the origin and render once.
    pub fn set_view(&mut self, view: CameraView) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        stage.camera.position = stage.framing.eye(view);
        stage.camera.up = view.up();
        stage.controls.target = Vec3::ZERO;
        stage.controls.reset_motion();
        self.render_now();
    }

    fn toggle_wireframe(&mut self, mount: &mut MountSurface) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        stage.material.wireframe = !stage.material.wireframe;
        if let Err(e) = stage.renderer.set_material(&stage.material) {
            tracing::warn!(error = %e, "material update failed");
        }
        let wireframe = stage.material.wireframe;
        if let Some(MountNode::Gizmo { wireframe: flag }) = self.gizmo.and_then(|id| mount.node_mut(id)) {
            *flag = wireframe;
        }
        self.render_now();
    }

    fn resize(&mut self, size: SurfaceSize, mount: &MountSurface) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        stage.camera.set_aspect(size.aspect());
        stage.renderer.resize(mount.render_size());
        stage.controls.handle_resize(size);
        self.render_now();
    }

    fn apply(&mut self, events: ControlEvents) {
        for event in events {
            match event {
                ControlEvent::Start => {
                    self.scheduler.start();
                    self.state = ModelState::Interacting;
                }
                ControlEvent::End => {
                    self.scheduler.end();
                    self.state = ModelState::Idle;
                    if let Some(stage) = &mut self.stage {
                        stage.controls.update(&mut stage.camera);
                    }
                    self.render_now();
                }
            }
        }
    }
}

impl AssetSession for ModelSession {
    fn kind(&self) -> &'static str {
        "stl"
    }

    fn token(&self) -> SelectionToken {
        self.watch.token()
    }

    fn tick(&mut self, _now: Duration, mount: &mut MountSurface) -> FrameRequest {
        match self.state {
            ModelState::Loading => self.poll_load(mount),
            ModelState::Idle | ModelState::Interacting => {
                if self.scheduler.take_frame() {
                    if let Some(stage) = &mut self.stage {
                        stage.controls.update(&mut stage.camera);
                    }
                    self.render_now();
                }
                self.scheduler.request()
            }
            ModelState::Halted | ModelState::Disposed => FrameRequest::Idle,
        }
    }

    fn handle_event(&mut self, event: &SurfaceEvent, mount: &mut MountSurface) -> FrameRequest {
        let Some(stage) = &mut self.stage else {
            return FrameRequest::Idle;
        };
        if self.state == ModelState::Disposed {
            return FrameRequest::Idle;
        }
        match *event {
            SurfaceEvent::PointerDown { button, pos } => {
                let events = stage.controls.pointer_down(button, pos);
                self.apply(events);
            }
            SurfaceEvent::PointerMove { pos } => stage.controls.pointer_move(pos),
            SurfaceEvent::PointerUp { .. } => {
                let events = stage.controls.pointer_up();
                self.apply(events);
            }
            SurfaceEvent::Wheel { delta } => {
                let events = stage.controls.wheel(delta);
                self.apply(events);
            }
            SurfaceEvent::Resize { size } => self.resize(size, mount),
            SurfaceEvent::Gizmo(GizmoAction::View(view)) => self.set_view(view),
            SurfaceEvent::Gizmo(GizmoAction::Wireframe) => self.toggle_wireframe(mount),
            SurfaceEvent::Click => {}
        }
        self.scheduler.request()
    }

    fn dispose(&mut self, mount: &mut MountSurface) -> Result<()> {
        if self.state == ModelState::Disposed {
            return Ok(());
        }
        self.state = ModelState::Disposed;

        self.scheduler.cancel();
        self.job = None;
        for id in self.listeners.drain(..) {
            mount.unlisten(id);
        }
        if let Some(mut stage) = self.stage.take() {
            stage.controls.dispose();
            stage.renderer.release_geometry();
            stage.renderer.release_material();
            stage.renderer.release_surface();
        }
        for id in [self.loading.take(), self.viewport.take(), self.gizmo.take()].into_iter().flatten() {
            mount.remove(id);
        }
        tracing::debug!(token = %self.watch.token(), renders = self.renders, "model session disposed");
        Ok(())
    }
}
