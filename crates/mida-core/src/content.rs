#![forbid(unsafe_code)]

//! Filtered pre-order traversal over a content tree.
//!
//! The takeover rewrites page text, but it should not care whether the tree is
//! a live DOM or an in-memory fixture. [`ContentTree`] exposes just enough to
//! walk one: children in document order, a node classification, and a text
//! setter. [`text_units`] walks depth-first and yields every text leaf along
//! with the context inherited from its ancestors; the caller's predicate
//! decides which units to keep.
//!
//! # Invariants
//!
//! 1. Units are yielded in document (pre-order) order.
//! 2. `protected` is true iff some ancestor element is marked protected,
//!    including ancestors of the root reported by [`ContentTree::root_context`].
//! 3. `non_renderable` is true iff some ancestor is a `script` or `style`
//!    element.

/// Tags whose text content never renders.
pub const NON_RENDERABLE_TAGS: [&str; 2] = ["script", "style"];

/// Classification of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Leaf text content.
    Text(String),
    /// Element with a (case-insensitive) tag name.
    Element { tag: String, protected: bool },
    /// Comments, processing instructions, and anything else to skip.
    Other,
}

/// A tree of elements and text leaves.
pub trait ContentTree {
    /// Node handle. Cheap to clone.
    type Node: Clone;

    /// Root to traverse, or `None` for an empty document.
    fn root(&self) -> Option<Self::Node>;

    /// Children of `node` in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Replace the content of a text node. Ignored for non-text nodes.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Context inherited by the root from ancestors outside the tree.
    fn root_context(&self) -> TextContext {
        TextContext::default()
    }

    /// Length of `text` in the tree's native unit. Defaults to Unicode
    /// scalar values.
    fn text_len(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Context inherited from a text unit's ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextContext {
    pub protected: bool,
    pub non_renderable: bool,
}

impl TextContext {
    fn enter(self, tag: &str, protected: bool) -> Self {
        let non_renderable = NON_RENDERABLE_TAGS
            .iter()
            .any(|candidate| tag.eq_ignore_ascii_case(candidate));
        Self {
            protected: self.protected || protected,
            non_renderable: self.non_renderable || non_renderable,
        }
    }
}

/// A text leaf found during traversal.
#[derive(Debug, Clone)]
pub struct TextUnit<N> {
    pub node: N,
    pub text: String,
    pub context: TextContext,
}

/// Collect every text unit under the tree root accepted by `accept`.
pub fn text_units<T, F>(tree: &T, mut accept: F) -> Vec<TextUnit<T::Node>>
where
    T: ContentTree + ?Sized,
    F: FnMut(&TextUnit<T::Node>) -> bool,
{
    let mut out = Vec::new();
    let Some(root) = tree.root() else {
        return out;
    };

    let mut stack = vec![(root, tree.root_context())];
    while let Some((node, context)) = stack.pop() {
        match tree.kind(&node) {
            NodeKind::Text(text) => {
                let unit = TextUnit {
                    node,
                    text,
                    context,
                };
                if accept(&unit) {
                    out.push(unit);
                }
            }
            NodeKind::Element { tag, protected } => {
                let inner = context.enter(&tag, protected);
                // Reverse so the first child is popped first.
                for child in tree.children(&node).into_iter().rev() {
                    stack.push((child, inner));
                }
            }
            NodeKind::Other => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// In-memory tree
// ---------------------------------------------------------------------------

/// Handle into a [`MemoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemNodeId(usize);

#[derive(Debug, Clone)]
enum MemNode {
    Element {
        tag: String,
        protected: bool,
        children: Vec<MemNodeId>,
    },
    Text(String),
    Comment,
}

/// Arena-backed content tree.
///
/// ```ignore
/// let mut tree = MemoryTree::new("main");
/// let p = tree.element(tree.root_id(), "p");
/// tree.text(p, "Hello there");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: Vec<MemNode>,
    outer: TextContext,
}

impl MemoryTree {
    /// Create a tree whose root element has tag `root_tag`.
    #[must_use]
    pub fn new(root_tag: &str) -> Self {
        Self {
            nodes: vec![MemNode::Element {
                tag: root_tag.to_owned(),
                protected: false,
                children: Vec::new(),
            }],
            outer: TextContext::default(),
        }
    }

    /// Mark the whole tree as sitting inside a protected ancestor.
    #[must_use]
    pub fn inside_protected(mut self) -> Self {
        self.outer.protected = true;
        self
    }

    #[must_use]
    pub const fn root_id(&self) -> MemNodeId {
        MemNodeId(0)
    }

    /// Append an element under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not an element of this tree.
    pub fn element(&mut self, parent: MemNodeId, tag: &str) -> MemNodeId {
        self.push(
            parent,
            MemNode::Element {
                tag: tag.to_owned(),
                protected: false,
                children: Vec::new(),
            },
        )
    }

    /// Append an element marked protected under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not an element of this tree.
    pub fn protected_element(&mut self, parent: MemNodeId, tag: &str) -> MemNodeId {
        self.push(
            parent,
            MemNode::Element {
                tag: tag.to_owned(),
                protected: true,
                children: Vec::new(),
            },
        )
    }

    /// Append a text leaf under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not an element of this tree.
    pub fn text(&mut self, parent: MemNodeId, text: &str) -> MemNodeId {
        self.push(parent, MemNode::Text(text.to_owned()))
    }

    /// Append a comment under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not an element of this tree.
    pub fn comment(&mut self, parent: MemNodeId) -> MemNodeId {
        self.push(parent, MemNode::Comment)
    }

    /// Text content of a leaf, `None` for non-text nodes.
    #[must_use]
    pub fn text_of(&self, id: MemNodeId) -> Option<&str> {
        match self.nodes.get(id.0)? {
            MemNode::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Every text leaf in document order.
    pub fn texts(&self) -> Vec<(MemNodeId, &str)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root_id()];
        while let Some(id) = stack.pop() {
            match &self.nodes[id.0] {
                MemNode::Text(text) => out.push((id, text.as_str())),
                MemNode::Element { children, .. } => stack.extend(children.iter().rev()),
                MemNode::Comment => {}
            }
        }
        out
    }

    fn push(&mut self, parent: MemNodeId, node: MemNode) -> MemNodeId {
        let id = MemNodeId(self.nodes.len());
        self.nodes.push(node);
        match self.nodes.get_mut(parent.0) {
            Some(MemNode::Element { children, .. }) => children.push(id),
            _ => panic!("parent {parent:?} is not an element"),
        }
        id
    }
}

impl ContentTree for MemoryTree {
    type Node = MemNodeId;

    fn root(&self) -> Option<MemNodeId> {
        Some(self.root_id())
    }

    fn children(&self, node: &MemNodeId) -> Vec<MemNodeId> {
        match self.nodes.get(node.0) {
            Some(MemNode::Element { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn kind(&self, node: &MemNodeId) -> NodeKind {
        match self.nodes.get(node.0) {
            Some(MemNode::Text(text)) => NodeKind::Text(text.clone()),
            Some(MemNode::Element { tag, protected, .. }) => NodeKind::Element {
                tag: tag.clone(),
                protected: *protected,
            },
            Some(MemNode::Comment) | None => NodeKind::Other,
        }
    }

    fn set_text(&mut self, node: &MemNodeId, text: &str) {
        if let Some(MemNode::Text(existing)) = self.nodes.get_mut(node.0) {
            text.clone_into(existing);
        }
    }

    fn root_context(&self) -> TextContext {
        self.outer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> MemoryTree {
        let mut tree = MemoryTree::new("main");
        let root = tree.root_id();
        let header = tree.element(root, "header");
        tree.text(header, "first");
        let guard = tree.protected_element(root, "section");
        let inner = tree.element(guard, "p");
        tree.text(inner, "guarded");
        let script = tree.element(root, "SCRIPT");
        tree.text(script, "let x = 1;");
        tree.comment(root);
        tree.text(root, "last");
        tree
    }

    #[test]
    fn traversal_is_preorder() {
        let tree = sample();
        let texts: Vec<String> = text_units(&tree, |_| true)
            .into_iter()
            .map(|u| u.text)
            .collect();
        assert_eq!(texts, vec!["first", "guarded", "let x = 1;", "last"]);
    }

    #[test]
    fn context_is_inherited_from_ancestors() {
        let tree = sample();
        let units = text_units(&tree, |_| true);
        let contexts: Vec<TextContext> = units.iter().map(|u| u.context).collect();
        assert_eq!(
            contexts,
            vec![
                TextContext::default(),
                TextContext {
                    protected: true,
                    non_renderable: false
                },
                TextContext {
                    protected: false,
                    non_renderable: true
                },
                TextContext::default(),
            ]
        );
    }

    #[test]
    fn protection_above_the_root_covers_every_unit() {
        let tree = sample().inside_protected();
        let units = text_units(&tree, |_| true);
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|u| u.context.protected));
        assert!(text_units(&tree, |u| !u.context.protected).is_empty());
    }

    #[test]
    #[should_panic(expected = "is not an element")]
    fn appending_under_a_text_leaf_panics() {
        let mut tree = MemoryTree::new("main");
        let root = tree.root_id();
        let leaf = tree.text(root, "leaf");
        tree.text(leaf, "nested");
    }

    #[test]
    fn predicate_filters_units() {
        let tree = sample();
        let kept = text_units(&tree, |u| !u.context.protected && !u.context.non_renderable);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn set_text_only_touches_text_nodes() {
        let mut tree = sample();
        let root = tree.root_id();
        tree.set_text(&root, "ignored");
        let (first, _) = tree.texts()[0];
        tree.set_text(&first, "changed");
        assert_eq!(tree.text_of(first), Some("changed"));
        assert_eq!(tree.text_of(root), None);
    }
}
