//! Marker discovery: turns framework comments in a live document into [`ComponentDescriptor`]s.

use crate::{
	descriptor::{ComponentDescriptor, ComponentKind},
	dom::{Dom, NodeKind},
	error::ProtocolError,
	marker::{self, StartMarker},
};
use core::cell::Cell;
use tracing::{error, instrument, trace, trace_span};

thread_local! {
	static NEXT_UNIQUE_ID: Cell<u64> = Cell::new(0);
}

fn next_unique_id() -> u64 {
	NEXT_UNIQUE_ID.with(|next| {
		let id = next.get();
		next.set(id + 1);
		id
	})
}

/// Discovers component markers and stamps each resulting descriptor with a fresh, monotonically
/// increasing [`unique_id`](`ComponentDescriptor::unique_id`).
///
/// Stamps come from one counter shared by every `Discoverer` on the thread, so descriptors from
/// separate passes never share one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discoverer;

impl Discoverer {
	#[must_use]
	pub fn new() -> Self {
		Self
	}

	/// Finds all markers of `kind` below `root`.
	///
	/// Server descriptors are ordered by their `sequence`, all others by discovery order.
	///
	/// # Errors
	///
	/// Any malformed marker aborts the whole pass.
	#[instrument(skip(self, dom))]
	pub fn discover<D: Dom>(&self, dom: &D, root: &D::Node, kind: ComponentKind) -> Result<Vec<ComponentDescriptor<D::Node>>, ProtocolError> {
		let mut found = Vec::new();
		self.walk(dom, root, Some(kind), &mut found).map_err(log_fatal)?;
		if kind == ComponentKind::Server {
			found.sort_by_key(|descriptor| descriptor.sequence());
		}
		trace!("Discovered {} {:?} descriptor(s).", found.len(), kind);
		Ok(found)
	}

	/// Like [`discover`](`Discoverer::discover`), but for every kind in one walk.
	///
	/// The result lists server descriptors (by `sequence`), then webassembly and then auto descriptors (by discovery order).
	///
	/// # Errors
	///
	/// Any malformed marker aborts the whole pass.
	#[instrument(skip(self, dom))]
	pub fn discover_all<D: Dom>(&self, dom: &D, root: &D::Node) -> Result<Vec<ComponentDescriptor<D::Node>>, ProtocolError> {
		let mut found = Vec::new();
		self.walk(dom, root, None, &mut found).map_err(log_fatal)?;
		let rank = |kind| match kind {
			ComponentKind::Server => 0,
			ComponentKind::WebAssembly => 1,
			ComponentKind::Auto => 2,
		};
		found.sort_by_key(|descriptor| {
			let kind = descriptor.kind();
			(rank(kind), if kind == ComponentKind::Server { descriptor.sequence() } else { None }, descriptor.unique_id())
		});
		trace!("Discovered {} descriptor(s).", found.len());
		Ok(found)
	}

	fn walk<D: Dom>(&self, dom: &D, parent: &D::Node, filter: Option<ComponentKind>, found: &mut Vec<ComponentDescriptor<D::Node>>) -> Result<(), ProtocolError> {
		let mut child = dom.first_child(parent);
		while let Some(current) = child {
			let mut next = dom.next_sibling(&current);

			let data = match dom.node_kind(&current) {
				NodeKind::Comment => dom.comment_data(&current),
				_ => None,
			};
			match data.as_deref().and_then(marker::marker_json) {
				Some(json) => {
					let span = trace_span!("Reading marker", json = if cfg!(feature = "dangerous-logging") { json } else { "…" });
					let _enter = span.enter();

					if dom.node_kind(parent) == NodeKind::Document {
						return Err(ProtocolError::MarkerOnDocument);
					}

					let StartMarker { prerender_id, key, payload } = marker::parse_start_marker(json)?;
					let end = match &prerender_id {
						Some(prerender_id) => {
							let end = find_end_marker(dom, &current, prerender_id)?;
							// Content between the markers belongs to this component and is not searched.
							next = dom.next_sibling(&end);
							Some(end)
						}
						None => None,
					};

					let mut descriptor = ComponentDescriptor {
						unique_id: 0,
						start: current,
						end,
						prerender_id,
						key,
						payload,
					};
					if filter.map_or(true, |kind| kind == descriptor.kind()) {
						descriptor.unique_id = next_unique_id();
						trace!(unique_id = descriptor.unique_id, kind = ?descriptor.kind(), "Found marker.");
						found.push(descriptor);
					}
				}
				None => self.walk(dom, &current, filter, found)?,
			}

			child = next;
		}
		Ok(())
	}
}

/// Scans the siblings following `start` (without descending into them) for the matching end marker.
fn find_end_marker<D: Dom>(dom: &D, start: &D::Node, prerender_id: &str) -> Result<D::Node, ProtocolError> {
	let mut sibling = dom.next_sibling(start);
	while let Some(current) = sibling {
		if dom.node_kind(&current) == NodeKind::Comment {
			if let Some(json) = dom.comment_data(&current).as_deref().and_then(marker::marker_json) {
				marker::validate_end_marker(json, prerender_id)?;
				return Ok(current);
			}
		}
		sibling = dom.next_sibling(&current);
	}
	Err(ProtocolError::MissingEndMarker { prerender_id: prerender_id.to_owned() })
}

fn log_fatal(error: ProtocolError) -> ProtocolError {
	error!("Component discovery failed: {}", error);
	error
}

/// Finds the first persisted component state comment below `root` in document order, removes it
/// from the document and returns its base64 payload.
#[instrument(skip(dom))]
pub fn discover_persisted_state<D: Dom>(dom: &mut D, root: &D::Node) -> Option<String> {
	let (node, state) = find_persisted_state(dom, root)?;
	dom.detach(&node);
	trace!("Consumed persisted component state ({} bytes of base64).", state.len());
	Some(state)
}

fn find_persisted_state<D: Dom>(dom: &D, parent: &D::Node) -> Option<(D::Node, String)> {
	let mut child = dom.first_child(parent);
	while let Some(current) = child {
		if dom.node_kind(&current) == NodeKind::Comment {
			if let Some(state) = dom.comment_data(&current).as_deref().and_then(marker::persisted_state) {
				return Some((current, state.to_owned()));
			}
		} else if let Some(found) = find_persisted_state(dom, &current) {
			return Some(found);
		}
		child = dom.next_sibling(&current);
	}
	None
}
