//! Frame-sequence player (`pngseq`).

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use super::{
    decode_image, AssetSession, FrameRequest, Job, JobPoll, MountNode, MountSurface, NodeId, SessionEnv,
    SurfaceSize, POLL_INTERVAL,
};
use crate::catalog::MAX_SEQUENCE_FRAMES;
use crate::token::{SelectionToken, TokenWatch};
use crate::util::{Error, Result};

/// Path of frame `n` (1-based): `{base}{n:04}.png`.
pub fn frame_path(base: &str, n: u32) -> String {
    format!("{base}{n:04}.png")
}

/// Timestamp-driven frame clock with catch-up.
#[derive(Debug, Clone)]
pub struct FrameClock {
    count: usize,
    interval: Duration,
    frame: usize,
    last: Option<Duration>,
}

impl FrameClock {
    pub fn new(count: usize, fps: f32) -> Self {
        Self {
            count: count.max(1),
            interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(f32::EPSILON))),
            frame: 0,
            last: None,
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advance by whole elapsed intervals. Returns the number of frames stepped.
    pub fn advance(&mut self, now: Duration) -> usize {
        let Some(last) = self.last else {
            self.last = Some(now);
            return 0;
        };
        let elapsed = now.saturating_sub(last);
        let steps = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as usize;
        if steps > 0 {
            self.frame = (self.frame + steps) % self.count;
            self.last = Some(last + self.interval * steps as u32);
        }
        steps
    }

    /// Time left until the next frame boundary.
    pub fn until_next(&self, now: Duration) -> Duration {
        match self.last {
            Some(last) => (last + self.interval).saturating_sub(now),
            None => self.interval,
        }
    }

    /// Forget the reference time so the next tick starts a fresh interval.
    pub fn rebase(&mut self) {
        self.last = None;
    }
}

type Loaded = (usize, Result<RgbaImage>);

pub struct SequenceSession {
    token: SelectionToken,
    clock: FrameClock,
    frames: Vec<Option<Arc<RgbaImage>>>,
    shown: Option<usize>,
    node: Option<NodeId>,
    job: Option<Job<Loaded>>,
    paused: bool,
}

impl SequenceSession {
    /// Mount a canvas and preload `count` frames on a worker.
    pub fn start(
        base: &str,
        count: u32,
        fps: f32,
        watch: TokenWatch,
        env: &SessionEnv,
        mount: &mut MountSurface,
    ) -> Result<Self> {
        if base.is_empty() || count == 0 {
            return Err(Error::MissingAssetField { kind: "pngseq", field: if base.is_empty() { "base" } else { "count" } });
        }
        let count = count.min(MAX_SEQUENCE_FRAMES);
        let source = Arc::clone(&env.source);
        let base_path = base.to_string();
        let token = watch.token();
        let job = Job::stream("monospec-sequence", move |tx| {
            for n in 1..=count {
                if !watch.is_current() {
                    tracing::debug!(token = %watch.token(), loaded = n - 1, "sequence preload abandoned");
                    return;
                }
                let decoded = source.read(&frame_path(&base_path, n)).and_then(|b| decode_image(&b));
                if tx.send((n as usize - 1, decoded)).is_err() {
                    return;
                }
            }
        })?;

        let node = mount.append(MountNode::Canvas { size: None, frame: None });
        Ok(Self {
            token,
            clock: FrameClock::new(count as usize, fps),
            frames: vec![None; count as usize],
            shown: None,
            node: Some(node),
            job: Some(job),
            paused: false,
        })
    }

    pub fn frame(&self) -> usize {
        self.clock.frame()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn loaded(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    fn receive(&mut self) {
        let Some(job) = &self.job else {
            return;
        };
        loop {
            match job.try_recv() {
                JobPoll::Ready((idx, Ok(img))) => {
                    if let Some(slot) = self.frames.get_mut(idx) {
                        *slot = Some(Arc::new(img));
                    }
                }
                JobPoll::Ready((idx, Err(e))) => {
                    tracing::debug!(token = %self.token, frame = idx + 1, error = %e, "sequence frame unavailable");
                }
                JobPoll::Pending => return,
                JobPoll::Closed => break,
            }
        }
        self.job = None;
    }

    fn draw(&mut self, mount: &mut MountSurface) {
        let current = self.clock.frame();
        let Some(image) = self.frames[current].clone() else {
            return;
        };
        if self.shown == Some(current) {
            return;
        }
        if let Some(MountNode::Canvas { size, frame }) = self.node.and_then(|id| mount.node_mut(id)) {
            if size.is_none() {
                *size = Some(SurfaceSize::new(image.width(), image.height()));
            }
            *frame = Some(image);
            self.shown = Some(current);
        }
    }
}

impl AssetSession for SequenceSession {
    fn kind(&self) -> &'static str {
        "pngseq"
    }

    fn token(&self) -> SelectionToken {
        self.token
    }

    fn tick(&mut self, now: Duration, mount: &mut MountSurface) -> FrameRequest {
        if self.node.is_none() {
            return FrameRequest::Idle;
        }
        self.receive();
        if self.paused {
            return FrameRequest::Idle;
        }
        self.clock.advance(now);
        self.draw(mount);

        let next = self.clock.until_next(now);
        if self.job.is_some() {
            FrameRequest::After(next.min(POLL_INTERVAL))
        } else {
            FrameRequest::After(next)
        }
    }

    fn set_paused(&mut self, paused: bool, _mount: &mut MountSurface) {
        if self.paused && !paused {
            self.clock.rebase();
        }
        self.paused = paused;
    }

    fn dispose(&mut self, mount: &mut MountSurface) -> Result<()> {
        self.job = None;
        if let Some(id) = self.node.take() {
            mount.remove(id);
        }
        Ok(())
    }
}
