//! Process-wide classifier slot
//!
//! The classifier is expensive to build (graph optimisation, device upload),
//! so it is loaded at most once and then shared read-only. Concurrent first
//! callers block on the init lock; only one of them runs the loader.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::classifier::Classifier;
use crate::error::Result;

pub struct SharedClassifier {
    cell: OnceLock<Arc<Classifier>>,
    init_lock: Mutex<()>,
}

impl SharedClassifier {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Slot that already holds `classifier`
    pub fn preloaded(classifier: Classifier) -> Self {
        let shared = Self::new();
        let _ = shared.cell.set(Arc::new(classifier));
        shared
    }

    /// The loaded classifier, if any
    pub fn get(&self) -> Option<Arc<Classifier>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Return the classifier, running `load` if nothing is loaded yet
    ///
    /// A failed load leaves the slot empty so a later call can retry.
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<Classifier>>
    where
        F: FnOnce() -> Result<Classifier>,
    {
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        log::info!("Loading classifier");
        let classifier = Arc::new(load()?);
        let _ = self.cell.set(Arc::clone(&classifier));
        Ok(classifier)
    }
}

impl Default for SharedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::classifier::test_models::{labels, FixedLogits};
    use crate::error::ClassifyError;

    fn build() -> Result<Classifier> {
        Classifier::from_model(Box::new(FixedLogits(vec![0.0, 1.0, 2.0])), labels(3))
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let shared = SharedClassifier::new();
        let loads = AtomicUsize::new(0);

        let results: Vec<Arc<Classifier>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        shared
                            .get_or_load(|| {
                                loads.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(50));
                                build()
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_load_can_retry() {
        let shared = SharedClassifier::new();
        let err = shared
            .get_or_load(|| Err(ClassifyError::ModelLoad("no weights".to_string())))
            .err()
            .unwrap();
        assert!(err.is_load_error());
        assert!(!shared.is_loaded());

        shared.get_or_load(build).unwrap();
        assert!(shared.is_loaded());
        assert!(shared.get().is_some());
    }

    #[test]
    fn test_preloaded_skips_loader() {
        let shared = SharedClassifier::preloaded(build().unwrap());
        let classifier = shared
            .get_or_load(|| panic!("loader must not run"))
            .unwrap();
        assert_eq!(classifier.labels().len(), 3);
    }
}
