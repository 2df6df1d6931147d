use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_NETWORK_IDLE;
use crate::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    WebSocket,
    EventSource,
    Other,
}

impl ResourceKind {
    /// Long-lived streams never finish, so they are not tracked.
    fn is_streaming(self) -> bool {
        matches!(self, ResourceKind::WebSocket | ResourceKind::EventSource)
    }
}

/// Network activity reported by the page being rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestStarted { id: String, kind: ResourceKind },
    Finished { id: String },
    Failed { id: String },
}

/// Fires once no tracked request has been outstanding for `idle_after`.
///
/// Every event re-arms the quiet-period timer while nothing is pending and
/// disarms it otherwise. At most one idle signal is buffered, and a waiter
/// only accepts it if no event arrived after the timer that sent it.
///
/// A finish may be observed before its start; the id is then remembered so
/// the late start does not leave it pending.
#[derive(Clone)]
pub struct NetworkIdleWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    idle_after: Duration,
    state: Mutex<State>,
    idle: Notify,
}

#[derive(Default)]
struct State {
    pending: HashSet<String>,
    finished_early: HashSet<String>,
    generation: u64,
    /// Generation whose quiet period last elapsed.
    settled: Option<u64>,
    timer: Option<JoinHandle<()>>,
}

impl NetworkIdleWatcher {
    pub fn new(idle_after: Duration) -> Self {
        let idle_after = if idle_after.is_zero() {
            DEFAULT_NETWORK_IDLE
        } else {
            idle_after
        };
        Self {
            inner: Arc::new(Inner {
                idle_after,
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn observe(&self, event: NetworkEvent) {
        let mut state = self.inner.lock();
        match event {
            NetworkEvent::RequestStarted { kind, .. } if kind.is_streaming() => return,
            NetworkEvent::RequestStarted { id, .. } => {
                if !state.finished_early.remove(&id) {
                    state.pending.insert(id);
                }
            }
            NetworkEvent::Finished { id } | NetworkEvent::Failed { id } => {
                if !state.pending.remove(&id) {
                    state.finished_early.insert(id);
                }
            }
        }
        Inner::rearm(&self.inner, &mut state);
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Waits for the idle signal. The timer is re-armed first so a page
    /// that never issued a request still settles after one quiet period.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        {
            let mut state = self.inner.lock();
            Inner::rearm(&self.inner, &mut state);
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                _ = self.inner.idle.notified() => {}
            }
            let settled = self.inner.lock().is_settled();
            if settled {
                return Ok(());
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rearm(this: &Arc<Self>, state: &mut State) {
        state.generation = state.generation.wrapping_add(1);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if !state.pending.is_empty() {
            return;
        }

        let generation = state.generation;
        let inner = Arc::clone(this);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.idle_after).await;
            let mut state = inner.lock();
            if state.generation == generation && state.pending.is_empty() {
                state.settled = Some(generation);
                inner.idle.notify_one();
            }
        }));
    }
}

impl State {
    fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.settled == Some(self.generation)
    }
}
