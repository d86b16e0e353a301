//! Disconnect recovery
//!
//! A disconnect is reported out-of-band by the platform, often from a thread
//! that must not block. The report is turned into a [`RecoveryRequest`] and
//! queued to a dedicated worker thread, which performs the stop-then-start.
//! Each request carries the session it was raised in so the engine can drop
//! requests that no longer apply.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

use super::backend::StreamDirection;
use super::error::{AudioError, AudioResult};

/// Pending requests before further notifications are dropped.
pub const RECOVERY_QUEUE_SIZE: usize = 16;

/// A request to restart the engine after a stream was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryRequest {
    /// Session the disconnected stream belonged to.
    pub session: u64,
    /// Which stream reported the disconnect.
    pub direction: StreamDirection,
}

/// Messages consumed by the recovery worker.
#[derive(Debug)]
pub(crate) enum RecoveryMessage {
    Restart(RecoveryRequest),
    Shutdown,
}

/// Creates the queue between disconnect notifiers and the worker.
pub(crate) fn recovery_channel() -> (Sender<RecoveryMessage>, Receiver<RecoveryMessage>) {
    bounded(RECOVERY_QUEUE_SIZE)
}

/// Fire-and-forget disconnect report handed to a backend with each stream.
///
/// `notify` never blocks, so it is safe to call from a platform error
/// callback.
#[derive(Clone, Debug)]
pub struct DisconnectNotifier {
    tx: Sender<RecoveryMessage>,
    request: RecoveryRequest,
}

impl DisconnectNotifier {
    pub(crate) fn new(
        tx: Sender<RecoveryMessage>,
        session: u64,
        direction: StreamDirection,
    ) -> Self {
        Self {
            tx,
            request: RecoveryRequest { session, direction },
        }
    }

    /// Schedules a restart. Returns false if the request was dropped.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(RecoveryMessage::Restart(self.request)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Recovery queue full, dropping {} disconnect",
                    self.request.direction
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Direction of the stream this notifier was issued for.
    pub fn direction(&self) -> StreamDirection {
        self.request.direction
    }

    /// Session this notifier was issued for.
    pub fn session(&self) -> u64 {
        self.request.session
    }
}

/// Owns the recovery thread. Dropping the worker shuts the thread down and
/// joins it.
pub(crate) struct RecoveryWorker {
    tx: Sender<RecoveryMessage>,
    thread: Option<JoinHandle<()>>,
}

impl RecoveryWorker {
    /// Spawns the worker, which calls `handler` for every restart request
    /// until shutdown or until `handler` returns false.
    pub fn spawn<F>(
        tx: Sender<RecoveryMessage>,
        rx: Receiver<RecoveryMessage>,
        mut handler: F,
    ) -> AudioResult<Self>
    where
        F: FnMut(RecoveryRequest) -> bool + Send + 'static,
    {
        let thread = thread::Builder::new()
            .name("mic-monitor-recovery".to_string())
            .spawn(move || {
                for message in rx.iter() {
                    match message {
                        RecoveryMessage::Restart(request) => {
                            if !handler(request) {
                                break;
                            }
                        }
                        RecoveryMessage::Shutdown => break,
                    }
                }
                log::debug!("Recovery worker exiting");
            })
            .map_err(|e| AudioError::BackendThread(e.to_string()))?;

        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Stops the worker after any request it is handling.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Fails only if the worker already exited.
            let _ = self.tx.send(RecoveryMessage::Shutdown);
            if thread.join().is_err() {
                log::error!("Recovery worker panicked");
            }
        }
    }
}

impl Drop for RecoveryWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_notifier_queues_request() {
        let (tx, rx) = recovery_channel();
        let notifier = DisconnectNotifier::new(tx, 3, StreamDirection::Input);
        assert_eq!(notifier.session(), 3);
        assert_eq!(notifier.direction(), StreamDirection::Input);

        assert!(notifier.notify());
        match rx.try_recv() {
            Ok(RecoveryMessage::Restart(request)) => {
                assert_eq!(request.session, 3);
                assert_eq!(request.direction, StreamDirection::Input);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_notifier_drops_when_full() {
        let (tx, _rx) = recovery_channel();
        let notifier = DisconnectNotifier::new(tx, 1, StreamDirection::Output);
        for _ in 0..RECOVERY_QUEUE_SIZE {
            assert!(notifier.notify());
        }
        assert!(!notifier.notify());
    }

    #[test]
    fn test_worker_handles_requests_and_shuts_down() {
        let (tx, rx) = recovery_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_worker = Arc::clone(&seen);

        let mut worker = RecoveryWorker::spawn(tx.clone(), rx, move |request| {
            seen_in_worker.lock().unwrap().push(request.session);
            true
        })
        .unwrap();

        let notifier = DisconnectNotifier::new(tx, 7, StreamDirection::Output);
        notifier.notify();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        worker.shutdown();
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        // The receiver went away with the worker.
        assert!(!notifier.notify());
    }

    #[test]
    fn test_notifier_is_send() {
        fn assert_send<T: Send + 'static>() {}
        assert_send::<DisconnectNotifier>();
    }
}
