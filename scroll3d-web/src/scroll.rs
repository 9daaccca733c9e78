/// Page scroll position read from the browser window
use scroll3d_core::{ScrollMetrics, ScrollSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowScroll;

impl ScrollSource for WindowScroll {
    fn metrics(&self) -> ScrollMetrics {
        let Some(window) = web_sys::window() else {
            return ScrollMetrics::default();
        };
        let scroll_height = window
            .document()
            .and_then(|d| d.document_element())
            .map_or(0.0, |root| root.scroll_height() as f64);

        ScrollMetrics {
            offset: window.scroll_y().unwrap_or(0.0),
            scroll_height,
            viewport_height: window
                .inner_height()
                .ok()
                .and_then(|h| h.as_f64())
                .unwrap_or(0.0),
        }
    }
}
