// ABOUTME: Health watcher task for the adopted strategy's relay sockets.
// ABOUTME: First close/error on any socket sends one epoch-tagged disconnect signal.

use futures::future::select_all;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::traits::RelaySocketMap;

/// Watches one connection generation's relay sockets.
///
/// The task resolves on the first terminal transition of any watched socket (a
/// dropped state sender counts as a close), sends a single signal carrying the
/// connection epoch, and exits. Detaching aborts the task, so attach/detach are
/// always paired around a strategy swap or teardown.
pub(crate) struct HealthWatcher {
    task: JoinHandle<()>,
}

impl HealthWatcher {
    /// Attach listeners to every socket in the map. Callers skip attaching for
    /// strategies without sockets; an empty map produces a task that never
    /// fires.
    pub(crate) fn attach(sockets: RelaySocketMap, epoch: u64, tx: mpsc::Sender<u64>) -> Self {
        let task = tokio::spawn(async move {
            let waiters: Vec<_> = sockets
                .values()
                .map(|socket| {
                    let mut rx = socket.subscribe();
                    async move {
                        let _ = rx.wait_for(|state| state.is_terminal()).await;
                    }
                    .boxed()
                })
                .collect();

            if waiters.is_empty() {
                return;
            }
            let _ = select_all(waiters).await;
            let _ = tx.send(epoch).await;
        });
        Self { task }
    }

    /// Stop watching. Idempotent with Drop.
    pub(crate) fn detach(&self) {
        self.task.abort();
    }
}

impl Drop for HealthWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
