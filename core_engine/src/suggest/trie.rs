use std::collections::HashMap;

use super::ranking::{self, RankedTerm};

/// One character on a path from the root.
///
/// `frequency` only counts queries for the term that ends exactly here; nodes
/// that exist purely as a prefix of longer terms keep a frequency of 0.
/// Nodes are built into an unpublished tree during a rebuild and never
/// mutated once that tree has been handed to readers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrieNode {
    character: Option<char>,
    frequency: u64,
    top_suggestions: Vec<RankedTerm>,
    children: HashMap<char, TrieNode>,
}

impl TrieNode {
    /// The sentinel root, which carries no character.
    pub fn root() -> Self {
        Self::default()
    }

    fn with_char(ch: char) -> Self {
        Self {
            character: Some(ch),
            ..Self::default()
        }
    }

    pub fn character(&self) -> Option<char> {
        self.character
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Cached ranking of the terms at or below this node, best first.
    pub fn top_suggestions(&self) -> &[RankedTerm] {
        &self.top_suggestions
    }

    pub fn get_child(&self, ch: char) -> Option<&TrieNode> {
        self.children.get(&ch)
    }

    pub fn get_or_create_child(&mut self, ch: char) -> &mut TrieNode {
        self.children
            .entry(ch)
            .or_insert_with(|| TrieNode::with_char(ch))
    }

    /// Follows `term` one character at a time from this node.
    pub fn find(&self, term: &str) -> Option<&TrieNode> {
        let mut node = self;
        for ch in term.chars() {
            node = node.get_child(ch)?;
        }
        Some(node)
    }

    /// Walks (creating as needed) the path for `term` and adds `count` to the
    /// terminal node.
    pub fn add_frequency(&mut self, term: &str, count: u64) {
        let mut node = self;
        for ch in term.chars() {
            node = node.get_or_create_child(ch);
        }
        node.frequency = node.frequency.saturating_add(count);
    }

    /// Recomputes `top_suggestions` for every node in the subtree, keeping at
    /// most `limit` entries per node.
    pub fn refresh_top_suggestions(&mut self, limit: usize) {
        let mut path = String::new();
        self.refresh_with_path(&mut path, limit);
    }

    fn refresh_with_path(&mut self, path: &mut String, limit: usize) {
        let mut candidates = Vec::new();
        if self.frequency > 0 {
            candidates.push(RankedTerm::new(path.clone(), self.frequency));
        }
        for (ch, child) in self.children.iter_mut() {
            path.push(*ch);
            child.refresh_with_path(path, limit);
            path.pop();
            candidates.extend(child.top_suggestions.iter().cloned());
        }
        ranking::rank(&mut candidates, limit);
        self.top_suggestions = candidates;
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(TrieNode::node_count).sum::<usize>()
    }

    /// Number of nodes where at least one query terminated.
    pub fn term_count(&self) -> usize {
        let own = usize::from(self.frequency > 0);
        own + self.children.values().map(TrieNode::term_count).sum::<usize>()
    }
}
