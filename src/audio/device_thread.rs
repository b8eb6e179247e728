//! Dedicated owner thread for a native device handle.
//!
//! cpal streams are not `Send`, so each one is built, started and dropped on a
//! thread of its own. The caller blocks until the device reports ready (or
//! fails) and later releases it with [`DeviceThread::stop`].

use crate::error::{DeviceError, ResourceReleaseError};
use crate::log_debug;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) struct DeviceThread {
    label: &'static str,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceThread {
    /// Run `open` on a new thread. The first half of its result stays alive on
    /// that thread until `stop`; the second half is handed back to the caller.
    pub(crate) fn spawn<F, K, R>(
        label: &'static str,
        timeout: Duration,
        open: F,
    ) -> Result<(Self, R), DeviceError>
    where
        F: FnOnce() -> Result<(K, R), DeviceError> + Send + 'static,
        K: 'static,
        R: Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<R, DeviceError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(format!("voxlive-{label}"))
            .spawn(move || {
                let keep_alive = match open() {
                    Ok((keep_alive, info)) => {
                        if ready_tx.send(Ok(info)).is_err() {
                            return;
                        }
                        keep_alive
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                // Sender dropped counts as stop too.
                let _ = stop_rx.recv();
                drop(keep_alive);
            })
            .map_err(|err| DeviceError::StartFailed {
                device: label.to_string(),
                reason: err.to_string(),
            })?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(info)) => Ok((
                Self {
                    label,
                    stop_tx: Some(stop_tx),
                    handle: Some(handle),
                },
                info,
            )),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                log_debug(&format!("{label} did not report ready; abandoning device thread"));
                drop(stop_tx);
                Err(DeviceError::Timeout {
                    device: label.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(DeviceError::StartFailed {
                    device: label.to_string(),
                    reason: "device thread exited during startup".to_string(),
                })
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    pub(crate) fn stop(&mut self) -> Result<(), ResourceReleaseError> {
        let Some(stop_tx) = self.stop_tx.take() else {
            return Err(ResourceReleaseError::AlreadyReleased(self.label));
        };
        let _ = stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| ResourceReleaseError::Failed {
                resource: self.label,
                reason: "device thread panicked".to_string(),
            })?;
        }
        Ok(())
    }
}

impl Drop for DeviceThread {
    fn drop(&mut self) {
        if self.stop_tx.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn stop_releases_keep_alive_once() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let (mut thread, info) = DeviceThread::spawn("test-device", Duration::from_secs(1), move || {
            Ok((DropFlag(flag), 48_000u32))
        })
        .expect("device thread starts");
        assert_eq!(info, 48_000);
        assert!(thread.is_running());
        assert!(!dropped.load(Ordering::SeqCst));

        thread.stop().expect("first stop succeeds");
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!thread.is_running());
        assert_eq!(
            thread.stop(),
            Err(ResourceReleaseError::AlreadyReleased("test-device"))
        );
    }

    #[test]
    fn open_error_is_returned_to_caller() {
        let result = DeviceThread::spawn::<_, (), ()>("mic", Duration::from_secs(1), || {
            Err(DeviceError::Unavailable {
                device: "mic".to_string(),
                reason: "unplugged".to_string(),
            })
        });
        match result {
            Err(DeviceError::Unavailable { reason, .. }) => assert_eq!(reason, "unplugged"),
            _ => panic!("expected unavailable error"),
        }
    }

    #[test]
    fn slow_open_times_out() {
        let result = DeviceThread::spawn::<_, (), ()>("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(200));
            Ok(((), ()))
        });
        assert!(matches!(result, Err(DeviceError::Timeout { timeout_ms: 20, .. })));
    }

    #[test]
    fn drop_stops_thread() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let (thread, ()) = DeviceThread::spawn("drop-device", Duration::from_secs(1), move || {
            Ok((DropFlag(flag), ()))
        })
        .expect("device thread starts");
        drop(thread);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
