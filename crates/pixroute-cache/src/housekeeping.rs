//! Background sweeping of the negative cache
//!
//! Lazy purging only removes records that are looked up again; the
//! housekeeper bounds memory for sources that never are.

use crate::cache::ImageCache;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to the housekeeping thread; stops the thread when dropped
#[derive(Debug)]
pub struct Housekeeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Housekeeper {
    /// Run [`ImageCache::housekeeping`] every `interval` on a named thread
    ///
    /// The thread holds only a weak reference and exits once the cache is dropped.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned
    pub fn spawn(cache: &Arc<ImageCache>, interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let cache: Weak<ImageCache> = Arc::downgrade(cache);

        let handle = thread::Builder::new()
            .name("pixroute-housekeeping".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        let removed = cache.housekeeping();
                        tracing::trace!(removed, "housekeeping pass");
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::debug!(interval_ms = interval.as_millis(), "housekeeper started");
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // disconnecting wakes the thread out of recv_timeout
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("housekeeping thread panicked");
            }
        }
    }
}

impl Drop for Housekeeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
