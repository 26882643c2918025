use super::surface::{RenderOp, Surface};

/// Session-owned state of the log panel.
///
/// Incoming log text replaces the whole panel, but only while auto-update is
/// on and the user is neither hovering over the panel nor scrolled away from
/// the tail.
#[derive(Debug)]
pub struct LogPanelState {
    auto_update: bool,
    hovered: bool,
    scrolled: bool,
}

impl LogPanelState {
    pub fn new(auto_update: bool) -> Self {
        Self {
            auto_update,
            hovered: false,
            scrolled: false,
        }
    }

    pub fn set_auto_update(&mut self, enabled: bool) {
        self.auto_update = enabled;
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    pub fn set_scrolled(&mut self, scrolled: bool) {
        self.scrolled = scrolled;
    }

    pub fn should_apply(&self) -> bool {
        self.auto_update && !self.hovered && !self.scrolled
    }

    /// Apply a full log replacement if the panel currently accepts updates.
    /// Returns whether the text was written.
    pub fn apply_log<S: Surface>(&self, text: String, surface: &mut S) -> bool {
        if !self.should_apply() {
            return false;
        }
        surface.apply(RenderOp::ReplaceLog { text });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::surface::RecordingSurface;

    #[test]
    fn log_updates_held_while_hovered_or_scrolled() {
        let mut surface = RecordingSurface::new();
        let mut panel = LogPanelState::new(true);
        assert!(panel.apply_log("a".to_string(), &mut surface));

        panel.set_hovered(true);
        assert!(!panel.apply_log("b".to_string(), &mut surface));

        panel.set_hovered(false);
        panel.set_scrolled(true);
        assert!(!panel.apply_log("c".to_string(), &mut surface));

        panel.set_scrolled(false);
        assert!(panel.apply_log("d".to_string(), &mut surface));
        assert_eq!(surface.ops.len(), 2);
    }

    #[test]
    fn auto_update_off_blocks_everything() {
        let mut surface = RecordingSurface::new();
        let mut panel = LogPanelState::new(false);
        assert!(!panel.apply_log("a".to_string(), &mut surface));

        panel.set_auto_update(true);
        assert!(panel.apply_log("b".to_string(), &mut surface));
    }
}
