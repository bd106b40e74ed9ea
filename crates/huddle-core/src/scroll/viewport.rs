use serde::{Deserialize, Serialize};

/// Scroll geometry of the message list as measured by the rendering layer.
///
/// All values are in pixels. `scroll_top` is the distance between the top of
/// the content and the top of the visible area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn distance_from_top(&self) -> f64 {
        self.scroll_top.max(0.0)
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - (self.scroll_top + self.client_height)).max(0.0)
    }

    /// `scroll_top + client_height >= scroll_height - threshold`
    pub fn is_at_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() <= threshold
    }
}

/// Instruction for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScrollCommand {
    /// Jump or animate to the newest message.
    ScrollToBottom { animated: bool },
    /// Set the scroll offset without animation.
    SetScrollTop(f64),
    /// Request the next older page.
    FetchOlder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_detection_uses_threshold() {
        let vp = Viewport::new(1450.0, 2000.0, 500.0);
        assert!(vp.is_at_bottom(50.0));
        assert!(!vp.is_at_bottom(40.0));
        assert_eq!(vp.distance_from_bottom(), 50.0);
    }

    #[test]
    fn test_short_content_is_always_at_bottom() {
        let vp = Viewport::new(0.0, 300.0, 500.0);
        assert!(vp.is_at_bottom(0.0));
        assert_eq!(vp.distance_from_bottom(), 0.0);
    }
}
