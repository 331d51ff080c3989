//! End-of-list detection
//!
//! Whatever renders a list reports whether its end marker is on screen.
//! `VisibilitySentinel` turns those reports into edges, and
//! `LoadMoreTrigger` decides whether an edge should fetch another page.

use crate::list::ListState;

/// Fires once per not-visible to visible transition
#[derive(Debug, Default, Clone)]
pub struct VisibilitySentinel {
    visible: bool,
}

impl VisibilitySentinel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the marker's visibility; true only when it just became visible
    pub fn observe(&mut self, visible: bool) -> bool {
        let fired = visible && !self.visible;
        self.visible = visible;
        fired
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Treat the marker as hidden so the next visible report fires again
    ///
    /// Used after a page lands while the marker never left the screen.
    pub fn rearm(&mut self) {
        self.visible = false;
    }
}

/// Sentinel gated on list state
#[derive(Debug, Default, Clone)]
pub struct LoadMoreTrigger {
    sentinel: VisibilitySentinel,
}

impl LoadMoreTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the marker just became visible and `list` can take a page
    pub fn observe<T>(&mut self, visible: bool, list: &ListState<T>) -> bool {
        let transitioned = self.sentinel.observe(visible);
        transitioned && !list.is_loading() && list.has_more
    }

    pub fn rearm(&mut self) {
        self.sentinel.rearm();
    }
}
