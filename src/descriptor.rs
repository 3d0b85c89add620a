use crate::marker::Marker;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Which backend a server-rendered region asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
	Server,
	WebAssembly,
	/// Decided at runtime by whichever backend becomes usable first.
	Auto,
}

/// An interactive execution environment able to host root components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	Server,
	WebAssembly,
}

impl BackendKind {
	/// Flush order within a reconciliation pass.
	pub const ALL: [Self; 2] = [Self::Server, Self::WebAssembly];
}

/// Author-supplied identity that survives re-rendering on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentKey {
	pub location_hash: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub formatted_component_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPayload {
	/// Authoritative render order.
	pub sequence: u32,
	/// Opaque, server-protected invocation descriptor.
	pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAssemblyPayload {
	pub assembly: String,
	pub type_name: String,
	/// Decoded from base64 at discovery time.
	pub parameter_definitions: Option<Vec<u8>>,
	/// Decoded from base64 at discovery time.
	pub parameter_values: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
	Server(ServerPayload),
	WebAssembly(WebAssemblyPayload),
	Auto { server: ServerPayload, webassembly: WebAssemblyPayload },
}

/// One server-rendered region destined for interactivity.
///
/// Descriptors are immutable. When a region changes, a new descriptor is discovered and matched
/// to the old one by [`RootComponentManager`](`crate::reconcile::RootComponentManager`).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor<N> {
	pub(crate) unique_id: u64,
	pub(crate) start: N,
	pub(crate) end: Option<N>,
	pub(crate) prerender_id: Option<String>,
	pub(crate) key: Option<ComponentKey>,
	pub(crate) payload: Payload,
}

impl<N> ComponentDescriptor<N> {
	/// Version stamp assigned at discovery. Not an identity.
	#[must_use]
	pub fn unique_id(&self) -> u64 {
		self.unique_id
	}

	#[must_use]
	pub fn start(&self) -> &N {
		&self.start
	}

	/// [`None`] for markers that weren't prerendered.
	#[must_use]
	pub fn end(&self) -> Option<&N> {
		self.end.as_ref()
	}

	#[must_use]
	pub fn prerender_id(&self) -> Option<&str> {
		self.prerender_id.as_deref()
	}

	#[must_use]
	pub fn key(&self) -> Option<&ComponentKey> {
		self.key.as_ref()
	}

	#[must_use]
	pub fn payload(&self) -> &Payload {
		&self.payload
	}

	#[must_use]
	pub fn kind(&self) -> ComponentKind {
		match self.payload {
			Payload::Server(_) => ComponentKind::Server,
			Payload::WebAssembly(_) => ComponentKind::WebAssembly,
			Payload::Auto { .. } => ComponentKind::Auto,
		}
	}

	/// Render order for server-kind descriptors.
	#[must_use]
	pub fn sequence(&self) -> Option<u32> {
		match &self.payload {
			Payload::Server(server) | Payload::Auto { server, .. } => Some(server.sequence),
			Payload::WebAssembly(_) => None,
		}
	}

	/// Whether `other` describes the same rendered content, ignoring version and node handles.
	pub(crate) fn same_content<M>(&self, other: &ComponentDescriptor<M>) -> bool {
		self.prerender_id == other.prerender_id && self.key == other.key && self.payload == other.payload
	}

	/// The backend-agnostic wire form of this descriptor as seen by `backend`.
	///
	/// Returns [`None`] if the descriptor can't be hosted by `backend`.
	#[must_use]
	pub fn to_marker(&self, backend: BackendKind) -> Option<Marker> {
		let (server, webassembly) = match &self.payload {
			Payload::Server(server) => (Some(server), None),
			Payload::WebAssembly(webassembly) => (None, Some(webassembly)),
			Payload::Auto { server, webassembly } => (Some(server), Some(webassembly)),
		};
		let prerender_id = self.prerender_id.clone();
		let key = self.key.clone();
		match backend {
			BackendKind::Server => server.map(|server| Marker::Server {
				prerender_id,
				key,
				sequence: server.sequence,
				descriptor: server.descriptor.clone(),
			}),
			BackendKind::WebAssembly => webassembly.map(|webassembly| Marker::WebAssembly {
				prerender_id,
				key,
				assembly: webassembly.assembly.clone(),
				type_name: webassembly.type_name.clone(),
				parameter_definitions: webassembly.parameter_definitions.as_deref().map(|bytes| STANDARD.encode(bytes)),
				parameter_values: webassembly.parameter_values.as_deref().map(|bytes| STANDARD.encode(bytes)),
			}),
		}
	}
}
