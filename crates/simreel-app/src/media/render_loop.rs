use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TrySendError, bounded};

/// Periodic tick source standing in for the host's per-frame callback.
///
/// Ticks are delivered as `Instant`s. The channel holds a single tick; if the
/// host has not consumed it the next one is dropped rather than queued, so a
/// stalled host never receives a burst of stale ticks.
///
/// Dropping the handle cancels the loop and joins the thread.
pub struct RenderLoop {
    ticks: Receiver<Instant>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn start(interval: Duration) -> std::io::Result<Self> {
        let (tx, ticks) = bounded::<Instant>(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("simreel-render-loop".into())
            .spawn(move || {
                while !thread_cancel.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    match tx.try_send(Instant::now()) {
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            })?;

        log::debug!("Render loop started ({:?} interval)", interval);

        Ok(Self {
            ticks,
            cancel,
            thread: Some(handle),
        })
    }

    /// Interval for a target rate in Hz (clamped to 1..=240).
    pub fn interval_for_rate(hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(hz.clamp(1, 240)))
    }

    pub fn ticks(&self) -> &Receiver<Instant> {
        &self.ticks
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        log::debug!("Render loop stopped");
    }
}
