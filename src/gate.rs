use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use teloxide::types::UserId;
use tracing::debug;

/// Registry of users that currently have a download in flight.
///
/// One instance is created per process and shared by reference. The lock is
/// never held across an `.await`, so check-and-insert is atomic for every task.
#[derive(Debug, Default)]
pub struct ActiveDownloads {
    users: Mutex<HashSet<UserId>>,
}

impl ActiveDownloads {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> MutexGuard<'_, HashSet<UserId>> {
        // The set stays consistent even if a holder panicked.
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `user_id` as busy. Returns `false` if it already was.
    pub fn try_acquire(&self, user_id: UserId) -> bool {
        let acquired = self.users().insert(user_id);
        debug!(user_id = user_id.0, acquired, "admission gate acquire");
        acquired
    }

    /// Forget `user_id`. Releasing a user that is not present is a no-op.
    pub fn release(&self, user_id: UserId) {
        let removed = self.users().remove(&user_id);
        debug!(user_id = user_id.0, removed, "admission gate release");
    }

    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.users().contains(&user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users().is_empty()
    }

    /// Acquire a permit that releases the user again when dropped.
    #[must_use]
    pub fn permit(self: &Arc<Self>, user_id: UserId) -> Option<DownloadPermit> {
        self.try_acquire(user_id).then(|| DownloadPermit {
            gate: Arc::clone(self),
            user_id,
        })
    }
}

/// Held for the whole lifetime of one request.
#[derive(Debug)]
pub struct DownloadPermit {
    gate: Arc<ActiveDownloads>,
    user_id: UserId,
}

impl DownloadPermit {
    #[inline]
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for DownloadPermit {
    fn drop(&mut self) {
        self.gate.release(self.user_id);
    }
}
