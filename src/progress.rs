//! Progress-callback trait for per-item assembly events.
//!
//! Inject an [`Arc<dyn AssemblyProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive
//! events as the assembler works through the logical items of a report.
//!
//! # Example
//!
//! ```rust
//! use edgequake_report::{AssemblyProgressCallback, ReportConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     degraded: AtomicUsize,
//! }
//!
//! impl AssemblyProgressCallback for CountingCallback {
//!     fn on_item_degraded(&self, index: usize, label: &str, reason: &str) {
//!         self.degraded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("item {} ({}) degraded: {}", index + 1, label, reason);
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { degraded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the assembler as it processes each item.
///
/// Items are processed strictly in order, one at a time. All methods have
/// default no-op implementations so callers only override what they need.
pub trait AssemblyProgressCallback: Send + Sync {
    /// Called once with the number of items about to be processed, when known.
    fn on_assembly_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called before an item is turned into blocks.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the item in the input
    /// * `label`: short item kind, e.g. `"diagram"`
    fn on_item_start(&self, index: usize, label: &str) {
        let _ = (index, label);
    }

    /// Called after an item produced its blocks.
    fn on_item_complete(&self, index: usize, label: &str, block_count: usize) {
        let _ = (index, label, block_count);
    }

    /// Called when an item fell back to an error note.
    fn on_item_degraded(&self, index: usize, label: &str, reason: &str) {
        let _ = (index, label, reason);
    }

    /// Called once after the PDF has been serialized.
    fn on_assembly_complete(&self, page_count: usize, degraded_items: usize) {
        let _ = (page_count, degraded_items);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl AssemblyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn AssemblyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completes: AtomicUsize,
        degraded: Mutex<Vec<String>>,
        pages: AtomicUsize,
    }

    impl AssemblyProgressCallback for Tracking {
        fn on_item_start(&self, _index: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _index: usize, _label: &str, _block_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_degraded(&self, _index: usize, label: &str, _reason: &str) {
            self.degraded.lock().unwrap().push(label.to_string());
        }

        fn on_assembly_complete(&self, page_count: usize, _degraded_items: usize) {
            self.pages.store(page_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_assembly_start(3);
        cb.on_item_start(0, "summary");
        cb.on_item_complete(0, "summary", 1);
        cb.on_item_degraded(1, "diagram", "timed out");
        cb.on_assembly_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Tracking::default();
        tracker.on_item_start(0, "table");
        tracker.on_item_complete(0, "table", 1);
        tracker.on_item_start(1, "diagram");
        tracker.on_item_degraded(1, "diagram", "HTTP status 500");
        tracker.on_item_complete(1, "diagram", 2);
        tracker.on_assembly_complete(4, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.degraded.lock().unwrap(), vec!["diagram".to_string()]);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_assembly_start(10);
        cb.on_item_start(0, "heading");
    }
}
