//! Model handle shared between the caller and gateway workers

use crate::api::Svm;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to one [`Svm`]
///
/// A worker holds the lock for the whole training call, so a second request
/// on the same handle waits for the first instead of interleaving with it.
#[derive(Debug, Clone, Default)]
pub struct SharedSvm(Arc<Mutex<Svm>>);

impl SharedSvm {
    pub fn new(svm: Svm) -> Self {
        Self(Arc::new(Mutex::new(svm)))
    }

    /// Lock the model; blocks while a worker is training it
    pub fn lock(&self) -> MutexGuard<'_, Svm> {
        self.0.lock()
    }

    /// Run `f` against the locked model
    pub fn with<R>(&self, f: impl FnOnce(&Svm) -> R) -> R {
        f(&self.0.lock())
    }

    /// Recover the model if this is the last handle
    pub fn try_unwrap(self) -> Result<Svm, Self> {
        Arc::try_unwrap(self.0)
            .map(Mutex::into_inner)
            .map_err(Self)
    }
}

impl From<Svm> for SharedSvm {
    fn from(svm: Svm) -> Self {
        Self::new(svm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StatModel;

    #[test]
    fn test_handles_share_state() {
        let handle = SharedSvm::new(Svm::new());
        let other = handle.clone();
        other.lock().set_c(7.5);
        assert_eq!(handle.with(|svm| svm.get_c()), 7.5);

        assert!(handle.try_unwrap().is_err());
        let svm = other.try_unwrap().expect("last handle");
        assert!(!svm.is_trained());
    }
}
