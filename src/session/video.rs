//! Looping video session (`webm`).
//!
//! Frames are decoded on a worker through a [`VideoDecoder`] and delivered
//! over a bounded channel, so a paused session also stalls the decoder.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use super::{
    AssetSession, FrameRequest, Job, JobPoll, ListenerId, ListenerKind, MountNode, MountSurface, NodeId,
    SessionEnv, SurfaceEvent, POLL_INTERVAL, VIDEO_ERROR,
};
use crate::token::{SelectionToken, TokenWatch};
use crate::util::{Error, Result};

/// Opens a decoded RGBA frame stream for a local file.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>>;
}

pub trait FrameStream: Send {
    /// Next frame, or `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<RgbaImage>>;
}

/// Decodes through `ffprobe` and an `ffmpeg` subprocess emitting raw RGBA.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    fn stream_size(&self, path: &Path) -> Result<(u32, u32)> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=width,height", "-of", "csv=p=0:s=x"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Video(format!("ffprobe: {e}")))?;
        if !output.status.success() {
            return Err(Error::Video(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_dimensions(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| Error::Video(format!("no video stream in {}", path.display())))
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        let (width, height) = self.stream_size(path)?;
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-re", "-stream_loop", "-1", "-i"])
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Video(format!("ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Video("ffmpeg stdout unavailable".into()))?;
        tracing::debug!(path = %path.display(), width, height, "ffmpeg started");
        Ok(Box::new(FfmpegStream {
            child,
            stdout,
            width,
            height,
            buf: vec![0; width as usize * height as usize * 4],
        }))
    }
}

/// Parse `WIDTHxHEIGHT` from the first line of ffprobe output.
fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    let (w, h) = (w.trim().parse().ok()?, h.trim().trim_end_matches(',').parse().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}

struct FfmpegStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl FrameStream for FfmpegStream {
    fn next_frame(&mut self) -> Result<Option<RgbaImage>> {
        match self.stdout.read_exact(&mut self.buf) {
            Ok(()) => Ok(RgbaImage::from_raw(self.width, self.height, self.buf.clone())),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Decoded frames queued ahead of the UI.
const FRAME_QUEUE: usize = 2;

pub struct VideoSession {
    token: SelectionToken,
    node: Option<NodeId>,
    click: Option<ListenerId>,
    job: Option<Job<Result<RgbaImage>>>,
    playing: bool,
    paused_by_host: bool,
}

impl VideoSession {
    pub fn start(src: &str, watch: TokenWatch, env: &SessionEnv, mount: &mut MountSurface) -> Result<Self> {
        let path = env.source.locate(src)?;
        let decoder = Arc::clone(&env.video);
        let token = watch.token();
        let job = Job::bounded("monospec-video", FRAME_QUEUE, move |tx| {
            let mut stream = match decoder.open(&path) {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };
            while watch.is_current() {
                match stream.next_frame() {
                    Ok(Some(frame)) => {
                        if tx.send(Ok(frame)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })?;

        let node = mount.append(MountNode::Video { src: src.to_string(), playing: true, frame: None });
        let click = mount.listen(ListenerKind::Click);
        Ok(Self {
            token,
            node: Some(node),
            click: Some(click),
            job: Some(job),
            playing: true,
            paused_by_host: false,
        })
    }

    fn active(&self) -> bool {
        self.playing && !self.paused_by_host
    }

    fn sync_node(&self, mount: &mut MountSurface) {
        let playing = self.playing;
        if let Some(MountNode::Video { playing: slot, .. }) = self.node.and_then(|id| mount.node_mut(id)) {
            *slot = playing;
        }
    }

    fn fail(&mut self, mount: &mut MountSurface, error: &Error) {
        tracing::warn!(token = %self.token, error = %error, "video playback failed");
        self.job = None;
        self.node = None;
        if let Some(id) = self.click.take() {
            mount.unlisten(id);
        }
        VIDEO_ERROR.show(mount);
    }
}

impl AssetSession for VideoSession {
    fn kind(&self) -> &'static str {
        "webm"
    }

    fn token(&self) -> SelectionToken {
        self.token
    }

    fn tick(&mut self, _now: Duration, mount: &mut MountSurface) -> FrameRequest {
        if !self.active() {
            return FrameRequest::Idle;
        }
        let Some(job) = &self.job else {
            return FrameRequest::Idle;
        };
        match job.drain_latest() {
            JobPoll::Pending => {}
            JobPoll::Ready(Ok(frame)) => {
                if let Some(MountNode::Video { frame: slot, .. }) = self.node.and_then(|id| mount.node_mut(id)) {
                    *slot = Some(Arc::new(frame));
                }
            }
            JobPoll::Ready(Err(e)) => {
                self.fail(mount, &e);
                return FrameRequest::Idle;
            }
            JobPoll::Closed => {
                // End of a non-looping stream: hold the last frame.
                self.job = None;
                return FrameRequest::Idle;
            }
        }
        FrameRequest::After(POLL_INTERVAL)
    }

    fn handle_event(&mut self, event: &SurfaceEvent, mount: &mut MountSurface) -> FrameRequest {
        if !matches!(event, SurfaceEvent::Click) || self.node.is_none() {
            return FrameRequest::Idle;
        }
        self.playing = !self.playing;
        self.sync_node(mount);
        tracing::debug!(token = %self.token, playing = self.playing, "video toggled");
        if self.active() { FrameRequest::Animate } else { FrameRequest::Idle }
    }

    fn playing(&self) -> Option<bool> {
        self.node.map(|_| self.playing)
    }

    fn set_paused(&mut self, paused: bool, _mount: &mut MountSurface) {
        self.paused_by_host = paused;
    }

    fn dispose(&mut self, mount: &mut MountSurface) -> Result<()> {
        self.playing = false;
        if let Some(id) = self.node {
            mount.replace(id, MountNode::Video { src: String::new(), playing: false, frame: None });
        }
        self.job = None;
        if let Some(id) = self.click.take() {
            mount.unlisten(id);
        }
        if let Some(id) = self.node.take() {
            mount.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("640x360\n"), Some((640, 360)));
        assert_eq!(parse_dimensions("\n 1920x1080,\n"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("0x0"), None);
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("N/A"), None);
    }
}
