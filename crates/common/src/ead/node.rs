//! Archive entries

use serde::{Deserialize, Serialize};

/// One component of an EAD finding aid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EadNode {
    pub id: String,
    pub label: String,
    /// Depth in the hierarchy, root = 0
    pub level: usize,
    /// Position in document order
    pub order: usize,
    pub description_level: Option<String>,
    pub unit_id: Option<String>,
    pub unit_date: Option<String>,
    pub associated_pi: Option<String>,
    #[serde(default)]
    pub children: Vec<EadNode>,

    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default)]
    pub search_hit: bool,
    #[serde(default)]
    pub contains_search_hit: bool,
}

impl EadNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            level: 0,
            order: 0,
            description_level: None,
            unit_id: None,
            unit_date: None,
            associated_pi: None,
            children: Vec::new(),
            visible: true,
            expanded: false,
            search_hit: false,
            contains_search_hit: false,
        }
    }

    pub fn with_child(mut self, child: EadNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&EadNode> {
        self.depth_first().find(|n| n.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut EadNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Number of nodes in this subtree, including this one
    pub fn count(&self) -> usize {
        self.depth_first().count()
    }

    /// Pre-order traversal, i.e. document order
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst { stack: vec![self] }
    }

    /// Assign `level` and `order` from the position in the hierarchy
    pub fn renumber(&mut self) {
        fn walk(node: &mut EadNode, level: usize, next: &mut usize) {
            node.level = level;
            node.order = *next;
            *next += 1;
            for child in &mut node.children {
                walk(child, level + 1, next);
            }
        }
        let mut next = 0;
        walk(self, 0, &mut next);
    }

    /// Text searched by tree searches
    pub(crate) fn matches(&self, needle_lower: &str) -> bool {
        [Some(&self.label), self.unit_id.as_ref(), self.unit_date.as_ref()]
            .into_iter()
            .flatten()
            .any(|s| s.to_lowercase().contains(needle_lower))
    }
}

pub struct DepthFirst<'a> {
    stack: Vec<&'a EadNode>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a EadNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EadNode {
        let mut root = EadNode::new("root", "Fonds")
            .with_child(EadNode::new("s1", "Series 1").with_child(EadNode::new("f1", "File 1")))
            .with_child(EadNode::new("s2", "Series 2"));
        root.renumber();
        root
    }

    #[test]
    fn test_depth_first_is_document_order() {
        let ids: Vec<_> = sample().depth_first().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["root", "s1", "f1", "s2"]);
    }

    #[test]
    fn test_renumber() {
        let root = sample();
        let f1 = root.find("f1").unwrap();
        assert_eq!(f1.level, 2);
        assert_eq!(f1.order, 2);
        assert_eq!(root.find("s2").unwrap().order, 3);
    }

    #[test]
    fn test_find_and_count() {
        let mut root = sample();
        assert_eq!(root.count(), 4);
        assert!(root.find("missing").is_none());
        root.find_mut("s2").unwrap().associated_pi = Some("PPN9".into());
        assert_eq!(root.find("s2").unwrap().associated_pi.as_deref(), Some("PPN9"));
        assert!(root.has_children());
        assert!(!root.find("f1").unwrap().has_children());
    }
}
