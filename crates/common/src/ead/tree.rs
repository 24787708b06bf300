//! Flattened EAD tree with expand/collapse/search view state

use super::node::EadNode;
use serde::{Deserialize, Serialize};

/// A node of the flattened tree; `node.children` is always empty here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEntry {
    pub index: usize,
    pub level: usize,
    pub parent: Option<usize>,
    pub child_indices: Vec<usize>,
    pub node: EadNode,
}

impl FlatEntry {
    pub fn has_children(&self) -> bool {
        !self.child_indices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EadTree {
    entries: Vec<FlatEntry>,
    collapse_level: usize,
    selected: Option<usize>,
}

impl EadTree {
    /// Flatten a hierarchy in document order; everything is expanded and visible
    pub fn generate(root: EadNode) -> Self {
        fn flatten(mut node: EadNode, level: usize, parent: Option<usize>, entries: &mut Vec<FlatEntry>) -> usize {
            let index = entries.len();
            let children = std::mem::take(&mut node.children);
            node.level = level;
            node.order = index;
            node.visible = true;
            node.expanded = true;
            entries.push(FlatEntry {
                index,
                level,
                parent,
                child_indices: Vec::new(),
                node,
            });
            for child in children {
                let child_index = flatten(child, level + 1, Some(index), entries);
                entries[index].child_indices.push(child_index);
            }
            index
        }

        let mut entries = Vec::new();
        flatten(root, 0, None, &mut entries);
        Self {
            entries,
            collapse_level: usize::MAX,
            selected: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&FlatEntry> {
        self.entries.get(index)
    }

    pub fn root(&self) -> Option<&FlatEntry> {
        self.entries.first()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.node.id == id)
    }

    pub fn collapse_level(&self) -> usize {
        self.collapse_level
    }

    /// Visible entries in document order
    pub fn tree_view(&self) -> Vec<&FlatEntry> {
        self.entries.iter().filter(|e| e.node.visible).collect()
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.entries.get(index).map(|e| e.node.visible).unwrap_or(false)
    }

    pub fn set_associated_pi(&mut self, id: &str, pi: &str) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.entries[index].node.associated_pi = Some(pi.to_string());
                true
            }
            None => false,
        }
    }

    /// A node is visible iff every ancestor is expanded. Parents precede
    /// their children, so one forward pass settles all entries.
    fn update_visibility(&mut self) {
        for i in 0..self.entries.len() {
            let visible = match self.entries[i].parent {
                None => true,
                Some(p) => self.entries[p].node.visible && self.entries[p].node.expanded,
            };
            self.entries[i].node.visible = visible;
        }
    }

    pub fn expand(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.node.expanded = true;
        self.update_visibility();
        true
    }

    pub fn collapse(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        entry.node.expanded = false;
        self.update_visibility();
        true
    }

    pub fn expand_all(&mut self) {
        for entry in &mut self.entries {
            entry.node.expanded = true;
        }
        self.update_visibility();
    }

    pub fn collapse_all(&mut self) {
        for entry in &mut self.entries {
            entry.node.expanded = false;
        }
        self.update_visibility();
    }

    /// Expand nodes above `level`, collapse the rest
    pub fn set_collapse_level(&mut self, level: usize) {
        self.collapse_level = level;
        for entry in &mut self.entries {
            entry.node.expanded = entry.level < level;
        }
        self.update_visibility();
    }

    /// Select a node by id, expanding its ancestors so it is shown
    pub fn select(&mut self, id: &str) -> Option<&FlatEntry> {
        let index = self.index_of(id)?;
        let mut parent = self.entries[index].parent;
        while let Some(p) = parent {
            self.entries[p].node.expanded = true;
            parent = self.entries[p].parent;
        }
        self.update_visibility();
        self.selected = Some(index);
        self.entries.get(index)
    }

    pub fn selected(&self) -> Option<&FlatEntry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    /// Mark matches of `term`; returns the number of hits
    pub fn search(&mut self, term: &str) -> usize {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            self.reset_search();
            return 0;
        }

        for entry in &mut self.entries {
            entry.node.search_hit = entry.node.matches(&needle);
            entry.node.contains_search_hit = false;
            entry.node.expanded = false;
        }

        let mut hits = 0;
        for i in 0..self.entries.len() {
            if !self.entries[i].node.search_hit {
                continue;
            }
            hits += 1;
            let mut parent = self.entries[i].parent;
            while let Some(p) = parent {
                self.entries[p].node.contains_search_hit = true;
                self.entries[p].node.expanded = true;
                parent = self.entries[p].parent;
            }
        }
        self.update_visibility();
        hits
    }

    /// Clear search marks and restore the collapse level
    pub fn reset_search(&mut self) {
        for entry in &mut self.entries {
            entry.node.search_hit = false;
            entry.node.contains_search_hit = false;
        }
        let level = self.collapse_level;
        self.set_collapse_level(level);
    }
}
