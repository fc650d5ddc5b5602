use std::fmt;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{Mutex, MutexGuard};

use crate::error::SqlClusterError;

/// Where a [`Client`](super::Client) is in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Starting,
    Ready,
    /// Initialization ran and failed; it is not attempted again.
    Failed,
    Closing,
    Closed,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Unstarted,
            1 => Self::Starting,
            2 => Self::Ready,
            3 => Self::Failed,
            4 => Self::Closing,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Unstarted => 0,
            Self::Starting => 1,
            Self::Ready => 2,
            Self::Failed => 3,
            Self::Closing => 4,
            Self::Closed => 5,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State word plus the gate that serializes transitions. Readers check the
/// atomic without locking; `init` and `close` hold the gate for the whole
/// transition so concurrent callers wait on it.
pub(crate) struct Lifecycle {
    state: AtomicU8,
    gate: Mutex<()>,
    failure: StdMutex<Option<SqlClusterError>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Unstarted.as_u8()),
            gate: Mutex::new(()),
            failure: StdMutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) async fn enter(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Record the first failure and move to `Failed`.
    pub(crate) fn fail(&self, err: &SqlClusterError) {
        let mut failure = self.failure.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(err.replay());
        }
        self.set(LifecycleState::Failed);
    }

    /// A fresh copy of the recorded failure, same variant as the original.
    pub(crate) fn failure(&self) -> SqlClusterError {
        self.failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map_or_else(
                || SqlClusterError::Other("initialization failed".to_string()),
                SqlClusterError::replay,
            )
    }
}
