/// Normalized page-scroll progress
use std::cell::Cell;
use std::rc::Rc;

/// Raw scroll measurements from the host page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Current vertical scroll offset
    pub offset: f64,
    /// Total document height
    pub scroll_height: f64,
    /// Visible height of the viewport
    pub viewport_height: f64,
}

impl ScrollMetrics {
    /// Scrollable distance; never negative
    pub fn extent(&self) -> f64 {
        (self.scroll_height - self.viewport_height).max(0.0)
    }

    /// `offset / extent` clamped to [0, 1]; 0 when nothing can scroll.
    pub fn progress(&self) -> f32 {
        let extent = self.extent();
        if !extent.is_finite() || extent <= 0.0 || !self.offset.is_finite() {
            return 0.0;
        }
        (self.offset / extent).clamp(0.0, 1.0) as f32
    }
}

/// Anything that can report the current scroll position
pub trait ScrollSource {
    fn metrics(&self) -> ScrollMetrics;
}

impl<T: ScrollSource + ?Sized> ScrollSource for Rc<T> {
    fn metrics(&self) -> ScrollMetrics {
        (**self).metrics()
    }
}

/// Stateless sampler over a [`ScrollSource`]
pub struct ScrollSignal<S> {
    source: S,
}

impl<S: ScrollSource> ScrollSignal<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current progress in [0, 1]
    pub fn sample(&self) -> f32 {
        self.source.metrics().progress()
    }
}

/// Scroll position held in memory, moved by whoever owns a clone.
///
/// Used by hosts without a real page (the terminal) and by tests.
#[derive(Debug, Clone, Default)]
pub struct VirtualScroll {
    offset: Rc<Cell<f64>>,
    scroll_height: Rc<Cell<f64>>,
    viewport_height: Rc<Cell<f64>>,
}

impl VirtualScroll {
    pub fn new(scroll_height: f64, viewport_height: f64) -> Self {
        let scroll = Self::default();
        scroll.scroll_height.set(scroll_height);
        scroll.viewport_height.set(viewport_height);
        scroll
    }

    pub fn offset(&self) -> f64 {
        self.offset.get()
    }

    /// Set the offset, kept within the scrollable extent
    pub fn scroll_to(&self, offset: f64) {
        let extent = self.metrics().extent();
        self.offset.set(offset.clamp(0.0, extent));
    }

    pub fn scroll_by(&self, delta: f64) {
        self.scroll_to(self.offset.get() + delta);
    }

    /// Change the page geometry, keeping the same relative position
    pub fn set_page(&self, scroll_height: f64, viewport_height: f64) {
        let progress = self.metrics().progress() as f64;
        self.scroll_height.set(scroll_height);
        self.viewport_height.set(viewport_height);
        self.offset.set(progress * self.metrics().extent());
    }

    /// Set the raw offset without clamping, as a browser might report
    /// during overscroll.
    pub fn set_raw_offset(&self, offset: f64) {
        self.offset.set(offset);
    }
}

impl ScrollSource for VirtualScroll {
    fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            offset: self.offset.get(),
            scroll_height: self.scroll_height.get(),
            viewport_height: self.viewport_height.get(),
        }
    }
}
