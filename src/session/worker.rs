//! Detached background jobs.
//!
//! A [`Job`] runs on its own named thread and reports through a channel. The
//! UI thread polls it from `tick`. Dropping the job closes the channel; the
//! thread notices on its next send and exits. Jobs are never joined.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};
use std::thread;

use crate::util::{Error, Result};

/// Outcome of a non-blocking poll.
#[derive(Debug)]
pub enum JobPoll<T> {
    Pending,
    Ready(T),
    /// The worker finished and every message was received.
    Closed,
}

pub struct Job<T> {
    rx: Receiver<T>,
    name: String,
}

impl<T: Send + 'static> Job<T> {
    /// Run `f` once and deliver its return value.
    pub fn spawn<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::stream(name, move |tx| {
            let _ = tx.send(f());
        })
    }

    /// Run `f` with an unbounded sender for multiple results.
    pub fn stream<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce(Sender<T>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        Self::start(name, rx, move || f(tx))
    }

    /// Run `f` with a bounded sender; the worker blocks when `capacity` results are queued.
    pub fn bounded<F>(name: &str, capacity: usize, f: F) -> Result<Self>
    where
        F: FnOnce(SyncSender<T>) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(capacity);
        Self::start(name, rx, move || f(tx))
    }

    fn start<F>(name: &str, rx: Receiver<T>, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|e| Error::Worker(format!("{name}: {e}")))?;
        Ok(Self { rx, name: name.to_string() })
    }
}

impl<T> Job<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn try_recv(&self) -> JobPoll<T> {
        match self.rx.try_recv() {
            Ok(v) => JobPoll::Ready(v),
            Err(TryRecvError::Empty) => JobPoll::Pending,
            Err(TryRecvError::Disconnected) => JobPoll::Closed,
        }
    }

    /// Latest queued result, skipping older ones.
    pub fn drain_latest(&self) -> JobPoll<T> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(v) => latest = Some(v),
                Err(TryRecvError::Empty) => {
                    return latest.map_or(JobPoll::Pending, JobPoll::Ready);
                }
                Err(TryRecvError::Disconnected) => {
                    return latest.map_or(JobPoll::Closed, JobPoll::Ready);
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait<T>(job: &Job<T>) -> JobPoll<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match job.try_recv() {
                JobPoll::Pending if Instant::now() < deadline => thread::sleep(Duration::from_millis(2)),
                other => return other,
            }
        }
    }

    #[test]
    fn test_spawn_delivers_once() {
        let job = Job::spawn("test-job", || 7).unwrap();
        assert!(matches!(wait(&job), JobPoll::Ready(7)));
        assert!(matches!(wait(&job), JobPoll::Closed));
    }

    #[test]
    fn test_drain_latest() {
        let job = Job::stream("test-stream", |tx| {
            for i in 0..3 {
                let _ = tx.send(i);
            }
        })
        .unwrap();
        assert!(matches!(wait(&job), JobPoll::Ready(0)));
        thread::sleep(Duration::from_millis(20));
        assert!(matches!(job.drain_latest(), JobPoll::Ready(2)));
    }

    #[test]
    fn test_dropped_job_stops_worker() {
        let (done_tx, done_rx) = mpsc::channel();
        let job = Job::bounded("test-bounded", 1, move |tx| {
            let mut sent = 0;
            while tx.send(sent).is_ok() {
                sent += 1;
            }
            let _ = done_tx.send(sent);
        })
        .unwrap();
        drop(job);
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
