//! In-flight request cancellation.
//!
//! Every request is issued under a ticket stamped with the scope's
//! current epoch. `cancel_all` bumps the epoch, which aborts anything
//! still waiting and marks late results as stale.

use std::future::Future;

use shield_client::{ClientError, Result};
use tokio::sync::watch;

#[derive(Debug)]
pub struct RequestScope {
    epoch: watch::Sender<u64>,
}

impl Default for RequestScope {
    fn default() -> Self {
        let (epoch, _) = watch::channel(0);
        Self { epoch }
    }
}

impl RequestScope {
    pub fn ticket(&self) -> RequestTicket {
        let rx = self.epoch.subscribe();
        let epoch = *rx.borrow();
        RequestTicket { epoch, rx }
    }

    pub fn cancel_all(&self) {
        self.epoch.send_modify(|e| *e += 1);
        log::debug!("[Client] cancelled in-flight requests (epoch {})", *self.epoch.borrow());
    }
}

#[derive(Debug, Clone)]
pub struct RequestTicket {
    epoch: u64,
    rx: watch::Receiver<u64>,
}

impl RequestTicket {
    /// False once `cancel_all` ran after this ticket was issued.
    pub fn is_current(&self) -> bool {
        *self.rx.borrow() == self.epoch
    }

    /// Drive `request` unless the scope is cancelled first.
    pub async fn run<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.is_current() {
            return Err(ClientError::Aborted);
        }
        let mut rx = self.rx.clone();
        let epoch = self.epoch;
        tokio::select! {
            result = request => result,
            _ = wait_for_cancel(&mut rx, epoch) => Err(ClientError::Aborted),
        }
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<u64>, epoch: u64) {
    while rx.changed().await.is_ok() {
        if *rx.borrow() != epoch {
            return;
        }
    }
    // scope dropped: nothing can cancel any more
    std::future::pending::<()>().await
}
