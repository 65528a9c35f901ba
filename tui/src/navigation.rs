//! Keyboard-driven selection over the timeline.
//!
//! Selection is a cursor over timeline indices and is independent of scroll position. The
//! transition table lives in [`transition`], a pure function of `(key, state)` plus the current
//! timeline length, so it can be exercised directly as data.
//!
//! Enter is overloaded: with a message selected it toggles that message's expansion; with nothing
//! selected it sends the composer contents. Pointer activation is handled separately by
//! [`Navigator::activate`], which selects *and* toggles in a single step.

/// Current selection. `Unselected` means the composer owns focus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Selected(usize),
}

impl Selection {
    pub fn index(self) -> Option<usize> {
        match self {
            Selection::Unselected => None,
            Selection::Selected(index) => Some(index),
        }
    }
}

/// Discrete navigation inputs, already filtered for modifiers by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Enter,
    Escape,
    /// Any character-producing keystroke.
    Typed,
    /// Input focus returned to the composer.
    Focus,
}

/// Side effect requested by a transition, carried out by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavEffect {
    None,
    ToggleExpanded(usize),
    Send,
}

/// The selection transition table.
///
/// `len` is the timeline length at the time the key is handled.
pub fn transition(key: NavKey, state: Selection, len: usize) -> (Selection, NavEffect) {
    use NavEffect as E;
    use NavKey as K;
    use Selection as S;

    match (key, state) {
        (K::Up, S::Unselected) if len > 0 => (S::Selected(len - 1), E::None),
        (K::Up, S::Unselected) => (S::Unselected, E::None),
        (K::Up, S::Selected(0)) => (S::Selected(0), E::None),
        (K::Up, S::Selected(i)) => (S::Selected(i - 1), E::None),

        (K::Down, S::Selected(i)) if i + 1 < len => (S::Selected(i + 1), E::None),
        (K::Down, S::Selected(_)) => (S::Unselected, E::None),
        (K::Down, S::Unselected) => (S::Unselected, E::None),

        (K::Enter, S::Selected(i)) => (S::Selected(i), E::ToggleExpanded(i)),
        (K::Enter, S::Unselected) => (S::Unselected, E::Send),

        (K::Escape | K::Typed | K::Focus, _) => (S::Unselected, E::None),
    }
}

#[derive(Debug, Default)]
pub struct Navigator {
    selection: Selection,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Applies `key` against a timeline of length `len` and returns the requested effect.
    pub fn handle(&mut self, key: NavKey, len: usize) -> NavEffect {
        self.clamp_to(len);
        let (next, effect) = transition(key, self.selection, len);
        if next != self.selection {
            tracing::trace!(?key, from = ?self.selection, to = ?next, "selection transition");
        }
        self.selection = next;
        effect
    }

    /// Pointer activation: select `index` and toggle its expansion.
    pub fn activate(&mut self, index: usize, len: usize) -> NavEffect {
        if index >= len {
            return NavEffect::None;
        }
        self.selection = Selection::Selected(index);
        NavEffect::ToggleExpanded(index)
    }

    /// Drops a selection that no longer points into a timeline of length `len`.
    pub fn clamp_to(&mut self, len: usize) {
        if let Selection::Selected(index) = self.selection
            && index >= len
        {
            self.selection = Selection::Unselected;
        }
    }
}
