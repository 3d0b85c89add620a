//! A headless [`Dom`] backed by a [`SlotMap`].
//!
//! Handles are plain `Copy` keys. Once a node is [deleted](`MemoryDocument::delete`) its slot may be
//! reused, and any handle still pointing at the old version resolves to nothing.

use crate::dom::{Dom, NodeKind};
use slotmap::{new_key_type, SlotMap};
use tracing::{trace, warn};

new_key_type! {
	pub struct NodeId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
	Document,
	Element { tag: String, attributes: Vec<(String, String)> },
	Text(String),
	Comment(String),
}

#[derive(Debug)]
struct Entry {
	node: MemoryNode,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct MemoryDocument {
	entries: SlotMap<NodeId, Entry>,
	document: NodeId,
}

impl Default for MemoryDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryDocument {
	#[must_use]
	pub fn new() -> Self {
		let mut entries = SlotMap::with_key();
		let document = entries.insert(Entry {
			node: MemoryNode::Document,
			parent: None,
			children: Vec::new(),
		});
		Self { entries, document }
	}

	fn allocate(&mut self, node: MemoryNode) -> NodeId {
		self.entries.insert(Entry { node, parent: None, children: Vec::new() })
	}

	fn entry(&self, id: NodeId) -> Option<&Entry> {
		self.entries.get(id)
	}

	fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
		self.entries.get_mut(id)
	}

	#[must_use]
	pub fn document(&self) -> NodeId {
		self.document
	}

	pub fn create_element(&mut self, tag: &str) -> NodeId {
		self.allocate(MemoryNode::Element { tag: tag.to_owned(), attributes: Vec::new() })
	}

	pub fn create_text(&mut self, text: &str) -> NodeId {
		self.allocate(MemoryNode::Text(text.to_owned()))
	}

	pub fn create_comment(&mut self, data: &str) -> NodeId {
		self.allocate(MemoryNode::Comment(data.to_owned()))
	}

	#[must_use]
	pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
		self.entry(id).map(|entry| &entry.node)
	}

	#[must_use]
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.entry(id).map_or(&[], |entry| &entry.children)
	}

	pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) {
		match self.entry_mut(element).map(|entry| &mut entry.node) {
			Some(MemoryNode::Element { attributes, .. }) => match attributes.iter_mut().find(|(n, _)| n == name) {
				Some((_, v)) => *v = value.to_owned(),
				None => attributes.push((name.to_owned(), value.to_owned())),
			},
			other => warn!("Can't set attribute {:?} on {:?}.", name, other),
		}
	}

	#[must_use]
	pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
		match self.node(element)? {
			MemoryNode::Element { attributes, .. } => attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str()),
			_ => None,
		}
	}

	/// Replaces the data of a comment node in place.
	pub fn set_comment_data(&mut self, comment: NodeId, data: &str) {
		match self.entry_mut(comment).map(|entry| &mut entry.node) {
			Some(MemoryNode::Comment(existing)) => *existing = data.to_owned(),
			other => warn!("Expected a comment but found {:?}.", other),
		}
	}

	/// Appends `child` as the last child of `parent`, detaching it from any previous parent first.
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
		self.insert_child(parent, child, None);
	}

	/// Inserts `child` into `parent` before `reference`, or at the end if `reference` is [`None`] or not a child of `parent`.
	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
		self.insert_child(parent, child, reference);
	}

	fn insert_child(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
		if !self.entries.contains_key(parent) || !self.entries.contains_key(child) {
			warn!("Ignoring insertion of stale node {:?} into {:?}.", child, parent);
			return;
		}
		if parent == child || self.is_ancestor_of(child, parent) {
			warn!("Ignoring insertion of {:?} into its own subtree.", child);
			return;
		}
		self.detach_node(child);

		if let Some(entry) = self.entries.get_mut(parent) {
			let children = &mut entry.children;
			let position = reference.and_then(|reference| children.iter().position(|c| *c == reference)).unwrap_or(children.len());
			children.insert(position, child);
		}
		if let Some(entry) = self.entries.get_mut(child) {
			entry.parent = Some(parent);
		}
	}

	fn is_ancestor_of(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		while let Some(parent) = self.entry(node).and_then(|entry| entry.parent) {
			if parent == ancestor {
				return true;
			}
			node = parent;
		}
		false
	}

	fn detach_node(&mut self, node: NodeId) {
		let parent = match self.entry_mut(node) {
			Some(entry) => entry.parent.take(),
			None => return,
		};
		if let Some(parent) = parent.and_then(|parent| self.entry_mut(parent)) {
			parent.children.retain(|c| *c != node);
		}
	}

	/// Detaches `node` and frees it along with its whole subtree. Outstanding handles go stale.
	pub fn delete(&mut self, node: NodeId) {
		if node == self.document {
			warn!("Refusing to delete the document node.");
			return;
		}
		self.detach_node(node);
		let mut stack = vec![node];
		let mut freed = 0_usize;
		while let Some(id) = stack.pop() {
			if let Some(entry) = self.entries.remove(id) {
				stack.extend(entry.children);
				freed += 1;
			}
		}
		trace!("Freed {} node(s).", freed);
	}

	/// Finds the first connected element whose `id` attribute equals `id`, in document order.
	#[must_use]
	pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
		let mut stack = vec![self.document];
		while let Some(node) = stack.pop() {
			if self.attribute(node, "id") == Some(id) {
				return Some(node);
			}
			stack.extend(self.children(node).iter().rev());
		}
		None
	}
}

impl Dom for MemoryDocument {
	type Node = NodeId;

	fn document_node(&self) -> NodeId {
		self.document
	}

	fn node_kind(&self, node: &NodeId) -> NodeKind {
		match self.node(*node) {
			Some(MemoryNode::Document) => NodeKind::Document,
			Some(MemoryNode::Element { .. }) => NodeKind::Element,
			Some(MemoryNode::Text(_)) => NodeKind::Text,
			Some(MemoryNode::Comment(_)) => NodeKind::Comment,
			None => NodeKind::Other,
		}
	}

	fn comment_data(&self, node: &NodeId) -> Option<String> {
		match self.node(*node)? {
			MemoryNode::Comment(data) => Some(data.clone()),
			_ => None,
		}
	}

	fn first_child(&self, node: &NodeId) -> Option<NodeId> {
		self.children(*node).first().copied()
	}

	fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
		let parent = self.entry(*node)?.parent?;
		let siblings = self.children(parent);
		let position = siblings.iter().position(|s| s == node)?;
		siblings.get(position + 1).copied()
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.entry(*node)?.parent
	}

	fn is_connected(&self, node: &NodeId) -> bool {
		*node == self.document || (self.entries.contains_key(*node) && self.is_ancestor_of(self.document, *node))
	}

	fn detach(&mut self, node: &NodeId) {
		self.detach_node(*node);
	}
}
