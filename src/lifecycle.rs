//! Mount lifecycle for panels.
//!
//! A panel is mounted for a span of time. Every asynchronous state write
//! commits through the [`MountToken`] captured when that work started; once
//! the panel is unmounted (or remounted, which issues a fresh token) such
//! writes are dropped. The check and the write happen under the lifecycle
//! lock, so nothing lands after [`PanelLifecycle::unmount`] returns.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{bail, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct LifecycleInner {
    generation: u64,
    active: Option<CancellationToken>,
}

#[derive(Debug, Clone, Default)]
pub struct PanelLifecycle {
    inner: Arc<Mutex<LifecycleInner>>,
}

impl PanelLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self) -> Result<MountToken> {
        let mut inner = lock(&self.inner);
        if inner.active.is_some() {
            bail!("panel already mounted");
        }
        inner.generation += 1;
        let cancel = CancellationToken::new();
        inner.active = Some(cancel.clone());
        Ok(MountToken {
            generation: inner.generation,
            cancel,
            lifecycle: Arc::clone(&self.inner),
        })
    }

    /// Returns false if the panel was not mounted.
    pub fn unmount(&self) -> bool {
        let mut inner = lock(&self.inner);
        match inner.active.take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.inner).active.is_some()
    }

    /// Token for the current mount, if any.
    pub fn token(&self) -> Option<MountToken> {
        let inner = lock(&self.inner);
        inner.active.as_ref().map(|cancel| MountToken {
            generation: inner.generation,
            cancel: cancel.clone(),
            lifecycle: Arc::clone(&self.inner),
        })
    }
}

/// Proof that work was started while a particular mount was live.
#[derive(Debug, Clone)]
pub struct MountToken {
    generation: u64,
    cancel: CancellationToken,
    lifecycle: Arc<Mutex<LifecycleInner>>,
}

impl MountToken {
    /// Runs `write` only if this mount is still live. Returns whether it ran.
    pub fn commit(&self, write: impl FnOnce()) -> bool {
        let inner = lock(&self.lifecycle);
        let live = inner.generation == self.generation
            && inner.active.is_some()
            && !self.cancel.is_cancelled();
        if live {
            write();
        }
        live
    }

    /// Awaits `fut` unless the mount ends first, in which case `None`.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Runs `task` in the background until it finishes or the mount ends.
    /// Mount never waits on platform calls; probes and reads go through here.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.clone();
        tokio::spawn(async move {
            token.guard(task).await;
        })
    }
}

pub(crate) fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Lets tasks spawned by a mount run to their next pending point.
#[cfg(test)]
pub(crate) async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
