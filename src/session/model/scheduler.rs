//! Demand-driven render loop state.
//!
//! Outside interaction the session renders only on explicit changes. Between
//! `start` and `end` the host is asked for a frame every tick; after `end`
//! one final frame is still owed, then the loop stops by itself.

use crate::session::FrameRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Interacting,
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    state: LoopState,
    frame_pending: bool,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self { state: LoopState::Idle, frame_pending: false }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_interacting(&self) -> bool {
        self.state == LoopState::Interacting
    }

    /// Enter the interaction loop and request a frame.
    pub fn start(&mut self) {
        self.state = LoopState::Interacting;
        self.frame_pending = true;
    }

    /// Leave the interaction loop. Any already requested frame still runs once.
    pub fn end(&mut self) {
        self.state = LoopState::Idle;
    }

    /// Consume the pending frame. Returns true if a frame should be drawn.
    pub fn take_frame(&mut self) -> bool {
        if !self.frame_pending {
            return false;
        }
        self.frame_pending = self.state == LoopState::Interacting;
        true
    }

    /// Drop any pending frame and stop the loop.
    pub fn cancel(&mut self) {
        self.state = LoopState::Idle;
        self.frame_pending = false;
    }

    pub fn request(&self) -> FrameRequest {
        if self.frame_pending {
            FrameRequest::Animate
        } else {
            FrameRequest::Idle
        }
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_runs_while_interacting() {
        let mut s = RenderScheduler::new();
        assert!(!s.take_frame());
        assert_eq!(s.request(), FrameRequest::Idle);

        s.start();
        for _ in 0..5 {
            assert_eq!(s.request(), FrameRequest::Animate);
            assert!(s.take_frame());
        }

        s.end();
        assert!(s.take_frame());
        assert!(!s.take_frame());
        assert_eq!(s.request(), FrameRequest::Idle);
    }

    #[test]
    fn test_cancel() {
        let mut s = RenderScheduler::new();
        s.start();
        s.cancel();
        assert_eq!(s.state(), LoopState::Idle);
        assert!(!s.take_frame());
    }
}
