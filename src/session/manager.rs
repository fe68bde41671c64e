//! Session manager: owns the mount and the single live session.

use std::time::Duration;

use crate::catalog::{AssetRef, Item};
use crate::selection::{Selection, SelectionChange};
use crate::token::{Generation, SelectionToken, TokenWatch};
use crate::util::{Error, Result};

use super::{
    AssetSession, FrameRequest, ImageSession, ListenerKind, ModelSession, MountNode, MountSurface, Notice, SequenceSession,
    SessionEnv, SurfaceEvent, SurfaceSize, VideoSession, IMAGE_ERROR, MODEL_UNAVAILABLE, NO_ASSET, NO_RESULTS,
    SEQUENCE_MISCONFIGURED, VIDEO_ERROR,
};

pub struct SessionManager {
    env: SessionEnv,
    generation: Generation,
    mount: MountSurface,
    active: Option<Box<dyn AssetSession>>,
    visible: bool,
}

impl SessionManager {
    pub fn new(env: SessionEnv, generation: Generation, size: SurfaceSize) -> Self {
        Self {
            env,
            generation,
            mount: MountSurface::new(size),
            active: None,
            visible: true,
        }
    }

    pub fn env(&self) -> &SessionEnv {
        &self.env
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn mount(&self) -> &MountSurface {
        &self.mount
    }

    /// Host-side mount settings (pixel ratio). Sessions own the nodes.
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        self.mount.set_pixel_ratio(ratio);
    }

    pub fn active_kind(&self) -> Option<&'static str> {
        self.active.as_ref().map(|s| s.kind())
    }

    pub fn active_token(&self) -> Option<SelectionToken> {
        self.active.as_ref().map(|s| s.token())
    }

    /// Dispose the current session and start one for `item`.
    pub fn show(&mut self, item: &Item, token: SelectionToken) {
        let _span = tracing::info_span!("show", item = %item.id, kind = item.asset.kind(), token = %token).entered();
        self.reset_mount();
        self.mount.append(MountNode::Backdrop);

        let watch = self.generation.watch(token);
        match self.start(item, watch) {
            Ok(mut session) => {
                tracing::info!(kind = session.kind(), "session started");
                if let Some(observer) = &self.env.observer {
                    observer.started(session.kind(), token);
                }
                if !self.visible {
                    session.set_paused(true, &mut self.mount);
                }
                self.active = Some(session);
            }
            Err(e) => {
                if e.is_configuration() {
                    tracing::info!(error = %e, "asset not configured");
                } else {
                    tracing::warn!(error = %e, "asset session failed to start");
                }
                failure_notice(&item.asset, &e).show(&mut self.mount);
            }
        }
    }

    /// Dispose the current session and show the empty-result placeholder.
    pub fn show_empty(&mut self, token: SelectionToken) {
        tracing::debug!(token = %token, "empty selection");
        self.show_notice(NO_RESULTS);
    }

    /// Dispose the current session and show a fixed placeholder.
    pub fn show_notice(&mut self, notice: Notice) {
        self.reset_mount();
        notice.show(&mut self.mount);
    }

    pub fn apply(&mut self, change: &SelectionChange) {
        match &change.selection {
            Selection::Item { item, .. } => self.show(item, change.token),
            Selection::Empty => self.show_empty(change.token),
        }
    }

    /// Advance the live session.
    pub fn tick(&mut self, now: Duration) -> FrameRequest {
        let Some(session) = &mut self.active else {
            return FrameRequest::Idle;
        };
        let _span = tracing::trace_span!("tick", kind = session.kind()).entered();
        session.tick(now, &mut self.mount)
    }

    /// Route an input event to the live session if it listens for that kind.
    pub fn dispatch(&mut self, event: SurfaceEvent) -> FrameRequest {
        if let SurfaceEvent::Resize { size } = event {
            if !self.mount.set_size(size) {
                return FrameRequest::Idle;
            }
        }
        if !self.mount.routes(event.listener_kind()) {
            return FrameRequest::Idle;
        }
        match &mut self.active {
            Some(session) => session.handle_event(&event, &mut self.mount),
            None => FrameRequest::Idle,
        }
    }

    /// Click on the mount. Returns the new playback state for media sessions.
    pub fn click(&mut self) -> Option<bool> {
        self.dispatch(SurfaceEvent::Click);
        if self.mount.routes(ListenerKind::Click) {
            self.playing()
        } else {
            None
        }
    }

    pub fn playing(&self) -> Option<bool> {
        self.active.as_ref().and_then(|s| s.playing())
    }

    /// Pause the live session while the pane is hidden.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if let Some(session) = &mut self.active {
            session.set_paused(!visible, &mut self.mount);
        }
    }

    /// Dispose everything; the host view is going away.
    pub fn teardown(&mut self) {
        self.reset_mount();
    }

    fn reset_mount(&mut self) {
        self.dispose_active();
        self.mount.clear();
        let leaked = self.mount.drop_listeners();
        if leaked > 0 {
            tracing::warn!(leaked, "listeners left registered after disposal");
        }
    }

    fn dispose_active(&mut self) {
        let Some(mut session) = self.active.take() else {
            return;
        };
        let (kind, token) = (session.kind(), session.token());
        if let Err(e) = session.dispose(&mut self.mount) {
            tracing::warn!(kind, token = %token, error = %e, "session disposal failed");
        }
        if let Some(observer) = &self.env.observer {
            observer.disposed(kind, token);
        }
        tracing::debug!(kind, token = %token, "session disposed");
    }

    fn start(&mut self, item: &Item, watch: TokenWatch) -> Result<Box<dyn AssetSession>> {
        let env = &self.env;
        let mount = &mut self.mount;
        let session: Box<dyn AssetSession> = match &item.asset {
            AssetRef::Image { src, .. } => Box::new(ImageSession::start(src, &item.name, watch, env, mount)?),
            AssetRef::Video { src } => Box::new(VideoSession::start(src, watch, env, mount)?),
            AssetRef::FrameSequence { base, count, fps } => {
                item.asset.validate()?;
                let (base, count) = (base.as_deref().unwrap_or_default(), count.unwrap_or_default());
                Box::new(SequenceSession::start(base, count, *fps, watch, env, mount)?)
            }
            AssetRef::Model { src } => Box::new(ModelSession::start(src, watch, env, mount)?),
            AssetRef::Unknown { kind } => {
                return Err(Error::UnsupportedAsset(kind.clone().unwrap_or_else(|| "<missing>".into())));
            }
        };
        Ok(session)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.dispose_active();
    }
}

/// Placeholder for a strategy that could not start.
fn failure_notice(asset: &AssetRef, error: &Error) -> Notice {
    match asset {
        AssetRef::Unknown { .. } => NO_ASSET,
        AssetRef::FrameSequence { .. } if error.is_configuration() => SEQUENCE_MISCONFIGURED,
        AssetRef::FrameSequence { .. } | AssetRef::Image { .. } => IMAGE_ERROR,
        AssetRef::Video { .. } => VIDEO_ERROR,
        AssetRef::Model { .. } => MODEL_UNAVAILABLE,
    }
}
