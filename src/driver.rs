// src/driver.rs
//
// Native host timer: a background thread that polls an EngineHandle at
// the configured interval.
//
// Web and iOS hosts bring their own timer and call `poll` directly.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::bridge::EngineHandle;
use crate::voice::VoiceSink;

/// Device clock the scheduler reads `now` from, in seconds.
pub trait AudioClock: Send {
    fn now(&self) -> f64;
}

/// Monotonic wall clock starting at zero on creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Running driver thread. Dropping it stops the thread.
pub struct DriverHandle<N, V> {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<EngineHandle<N, V>>>,
}

/// Spawn a thread polling `engine` every `interval`.
///
/// A scheduler error stops the transport (see [`Transport::poll`]); the
/// thread keeps polling so later commands can start it again.
///
/// [`Transport::poll`]: crate::transport::Transport::poll
pub fn spawn_driver<N, V, C>(
    mut engine: EngineHandle<N, V>,
    clock: C,
    interval: Duration,
) -> io::Result<DriverHandle<N, V>>
where
    N: Clone + Send + Sync + 'static,
    V: VoiceSink<N> + Send + 'static,
    C: AudioClock + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let thread = thread::Builder::new()
        .name("collider-scheduler".into())
        .spawn(move || {
            log::debug!("Scheduler driver started ({:?} interval)", interval);

            while !flag.load(Ordering::Acquire) {
                if let Err(e) = engine.poll(clock.now()) {
                    log::warn!("Driver pass failed: {}", e);
                }
                thread::sleep(interval);
            }

            engine.stop(clock.now());
            log::debug!("Scheduler driver stopped");
            engine
        })?;

    Ok(DriverHandle {
        cancel,
        thread: Some(thread),
    })
}

impl<N, V> DriverHandle<N, V> {
    /// Stop the thread and hand the engine back.
    ///
    /// Returns `None` if the thread panicked.
    pub fn cancel(mut self) -> Option<EngineHandle<N, V>> {
        self.join()
    }

    fn join(&mut self) -> Option<EngineHandle<N, V>> {
        self.cancel.store(true, Ordering::Release);
        self.thread.take()?.join().ok()
    }
}

impl<N, V> Drop for DriverHandle<N, V> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
