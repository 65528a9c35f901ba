//! Append-only message log for a chat session.
//!
//! The timeline is the arena for every other piece of per-message view state: indices are stable
//! because nothing is ever removed or reordered, so expansion is a sparse set keyed by index.

use std::collections::HashSet;

use hush_protocol::ChatMessage;

#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<ChatMessage>,
    expanded: HashSet<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `message` to the end of the log and returns its index.
    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Read-only view in arrival order. Calling it twice yields the same sequence.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ChatMessage> + '_ {
        self.messages.iter()
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    /// Flips the expansion of `index`. Out-of-range indices are ignored.
    ///
    /// Returns the new state, or `None` when the index does not exist.
    pub fn toggle_expanded(&mut self, index: usize) -> Option<bool> {
        if index >= self.messages.len() {
            return None;
        }
        if self.expanded.remove(&index) {
            Some(false)
        } else {
            self.expanded.insert(index);
            Some(true)
        }
    }
}
