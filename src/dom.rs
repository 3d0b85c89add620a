//! The slice of the DOM the engine needs to look at.
//!
//! Descriptors never own the nodes they point at. They keep a [`Dom::Node`] handle that is resolved
//! against the current document whenever the engine needs to know whether a region is still there,
//! so a handle outliving its node is harmless: it simply stops being [connected](`Dom::is_connected`).

use core::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Document,
	Element,
	Text,
	Comment,
	Other,
}

pub trait Dom {
	/// A cheap, non-owning handle to a node.
	type Node: Clone + PartialEq + Debug;

	/// The document node itself, i.e. the parent of the root element.
	fn document_node(&self) -> Self::Node;

	fn node_kind(&self, node: &Self::Node) -> NodeKind;

	/// The data of a comment node, [`None`] for any other kind of node.
	fn comment_data(&self, node: &Self::Node) -> Option<String>;

	fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

	/// Whether `node` is (still) part of the live document.
	fn is_connected(&self, node: &Self::Node) -> bool;

	/// Detaches `node` from its parent. Detaching an already detached node does nothing.
	fn detach(&mut self, node: &Self::Node);
}
