/// Accumulates transcript fragments into one in-progress utterance.
///
/// Confirmed fragments append to a stable buffer; interim fragments only
/// affect the display view. The silence timer that decides when the buffer
/// is a complete utterance lives in the runtime; this type just owns the
/// text state.
#[derive(Debug, Default)]
pub struct UtteranceSegmenter {
    confirmed: String,
    interim: Option<String>,
}

impl UtteranceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed fragment. Re-delivered text is tolerated: if the
    /// trimmed fragment is already contained in the buffer, nothing changes
    /// and `false` is returned.
    pub fn push_final(&mut self, fragment: &str) -> bool {
        self.interim = None;
        let fragment = fragment.trim();
        if fragment.is_empty() || self.confirmed.contains(fragment) {
            return false;
        }
        if !self.confirmed.is_empty() {
            self.confirmed.push(' ');
        }
        self.confirmed.push_str(fragment);
        true
    }

    /// Update the interim candidate. Display-only; the confirmed buffer is
    /// untouched.
    pub fn push_interim(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            self.interim = None;
        } else {
            self.interim = Some(fragment.to_string());
        }
    }

    /// The live caption: confirmed text plus the interim candidate, if any.
    /// The bool marks whether the view contains interim text.
    pub fn display(&self) -> (String, bool) {
        match &self.interim {
            Some(interim) if self.confirmed.is_empty() => (interim.clone(), true),
            Some(interim) => (format!("{} {}", self.confirmed, interim), true),
            None => (self.confirmed.clone(), false),
        }
    }

    pub fn has_confirmed(&self) -> bool {
        !self.confirmed.is_empty()
    }

    /// Drain the confirmed buffer as one finalized utterance.
    pub fn take(&mut self) -> Option<String> {
        self.interim = None;
        if self.confirmed.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.confirmed))
        }
    }

    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.interim = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_confirmed_fragments_with_spaces() {
        let mut seg = UtteranceSegmenter::new();
        assert!(seg.push_final("hello"));
        assert!(seg.push_final("how are you"));
        assert_eq!(seg.take().as_deref(), Some("hello how are you"));
        assert!(seg.take().is_none());
    }

    #[test]
    fn redelivered_fragment_leaves_buffer_unchanged() {
        let mut seg = UtteranceSegmenter::new();
        assert!(seg.push_final("tell me about rust"));
        assert!(!seg.push_final("tell me about rust"));
        assert!(!seg.push_final("about rust"));
        assert_eq!(seg.take().as_deref(), Some("tell me about rust"));
    }

    #[test]
    fn interim_only_affects_display() {
        let mut seg = UtteranceSegmenter::new();
        seg.push_final("the quick");
        seg.push_interim("brown fo");

        let (view, interim) = seg.display();
        assert_eq!(view, "the quick brown fo");
        assert!(interim);

        // The confirmed buffer never saw the interim text.
        assert_eq!(seg.take().as_deref(), Some("the quick"));
    }

    #[test]
    fn final_fragment_supersedes_interim_view() {
        let mut seg = UtteranceSegmenter::new();
        seg.push_interim("the qui");
        seg.push_final("the quick brown fox");

        let (view, interim) = seg.display();
        assert_eq!(view, "the quick brown fox");
        assert!(!interim);
    }

    #[test]
    fn whitespace_fragments_are_dropped() {
        let mut seg = UtteranceSegmenter::new();
        assert!(!seg.push_final("   "));
        seg.push_interim("  ");
        assert!(!seg.has_confirmed());
        assert_eq!(seg.display(), (String::new(), false));
    }
}
