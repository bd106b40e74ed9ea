/// Tap-to-reveal timestamp selection for one feed.
///
/// At most one message shows its timestamp inline at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampReveal {
    selected: Option<String>,
}

impl TimestampReveal {
    /// Selects `message_id`, or clears the selection if it was already
    /// selected. Returns the id now revealed.
    pub fn toggle(&mut self, message_id: &str) -> Option<&str> {
        if self.selected.as_deref() == Some(message_id) {
            self.selected = None;
        } else {
            self.selected = Some(message_id.to_string());
        }
        self.selected.as_deref()
    }

    pub fn is_revealed(&self, message_id: &str) -> bool {
        self.selected.as_deref() == Some(message_id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_selection() {
        let mut reveal = TimestampReveal::default();

        assert_eq!(reveal.toggle("81"), Some("81"));
        assert_eq!(reveal.toggle("90"), Some("90"));
        assert!(!reveal.is_revealed("81"));
        assert!(reveal.is_revealed("90"));

        assert_eq!(reveal.toggle("90"), None);
        assert_eq!(reveal.selected(), None);
    }
}
