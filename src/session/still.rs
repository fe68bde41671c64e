//! Static image session (`img`, `gif`).

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use super::{
    decode_image, AssetSession, FrameRequest, Job, JobPoll, MountNode, MountSurface, NodeId, SessionEnv,
    IMAGE_ERROR, POLL_INTERVAL,
};
use crate::token::{Cancelable, SelectionToken, TokenWatch};
use crate::util::{Error, Result};

type Decoded = Cancelable<Result<RgbaImage>>;

pub struct ImageSession {
    token: SelectionToken,
    node: Option<NodeId>,
    job: Option<Job<Decoded>>,
}

impl ImageSession {
    /// Mount an empty image node and decode `src` in the background.
    pub fn start(
        src: &str,
        alt: &str,
        watch: TokenWatch,
        env: &SessionEnv,
        mount: &mut MountSurface,
    ) -> Result<Self> {
        let source = Arc::clone(&env.source);
        let path = src.to_string();
        let token = watch.token();
        let job = Job::spawn("monospec-image", move || {
            if !watch.is_current() {
                return watch.guard(Err(Error::other("selection changed")));
            }
            let decoded = source.read(&path).and_then(|bytes| decode_image(&bytes));
            watch.guard(decoded)
        })?;

        let node = mount.append(MountNode::Image {
            src: src.to_string(),
            alt: alt.to_string(),
            pixels: None,
        });
        Ok(Self { token, node: Some(node), job: Some(job) })
    }

    fn fail(&mut self, mount: &mut MountSurface, error: &Error) {
        tracing::warn!(token = %self.token, error = %error, "image load failed");
        IMAGE_ERROR.show(mount);
        self.node = None;
    }
}

impl AssetSession for ImageSession {
    fn kind(&self) -> &'static str {
        "img"
    }

    fn token(&self) -> SelectionToken {
        self.token
    }

    fn tick(&mut self, _now: Duration, mount: &mut MountSurface) -> FrameRequest {
        let Some(job) = &self.job else {
            return FrameRequest::Idle;
        };
        match job.try_recv() {
            JobPoll::Pending => return FrameRequest::After(POLL_INTERVAL),
            JobPoll::Ready(result) => {
                self.job = None;
                match result.resume() {
                    None => {}
                    Some(Ok(pixels)) => {
                        if let Some(MountNode::Image { pixels: slot, .. }) =
                            self.node.and_then(|id| mount.node_mut(id))
                        {
                            *slot = Some(Arc::new(pixels));
                        }
                    }
                    Some(Err(e)) => self.fail(mount, &e),
                }
            }
            JobPoll::Closed => {
                self.job = None;
                self.fail(mount, &Error::Worker("image decoder exited".into()));
            }
        }
        FrameRequest::Idle
    }

    fn dispose(&mut self, mount: &mut MountSurface) -> Result<()> {
        self.job = None;
        if let Some(id) = self.node.take() {
            mount.remove(id);
        }
        Ok(())
    }
}
