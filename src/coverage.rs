//! Class-usage probe: records which classes had a constructor or method
//! executed.

use std::collections::BTreeSet;

use parking_lot::Mutex;

/// Per-class "used" flag with check-and-reset.
pub trait CoverageProbe: Send + Sync {
    /// Sets the flag for `class`.
    fn mark_used(&self, class: &str);

    fn was_used(&self, class: &str) -> bool;

    /// Clears the flag for `class`.
    fn reset(&self, class: &str);

    /// Returns the flag for `class` and clears it.
    fn check_and_reset(&self, class: &str) -> bool {
        let used = self.was_used(class);
        self.reset(class);
        used
    }
}

#[derive(Debug, Default)]
/// In-memory [`CoverageProbe`]. Every flag starts cleared.
pub struct ClassUsageProbe {
    used: Mutex<BTreeSet<String>>,
}

impl ClassUsageProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classes currently flagged, in name order.
    pub fn used_classes(&self) -> Vec<String> {
        self.used.lock().iter().cloned().collect()
    }

    /// Clears every flag.
    pub fn reset_all(&self) {
        self.used.lock().clear();
    }
}

impl CoverageProbe for ClassUsageProbe {
    fn mark_used(&self, class: &str) {
        self.used.lock().insert(class.to_string());
    }

    fn was_used(&self, class: &str) -> bool {
        self.used.lock().contains(class)
    }

    fn reset(&self, class: &str) {
        self.used.lock().remove(class);
    }

    fn check_and_reset(&self, class: &str) -> bool {
        self.used.lock().remove(class)
    }
}
