//! Error types.
//!
//! Malformed markers and broken call contracts are fatal to the pass that encountered them and are
//! returned as [`Err`]. Network trouble is recovered inside the navigator and only ever shows up in
//! logs; cancellation is not an error at all (see [`CancellationToken`](`crate::cancel::CancellationToken`)).

use crate::descriptor::BackendKind;
use thiserror::Error;

/// The server and client disagree about the marker wire format. Not recoverable locally.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("component marker payload is not valid JSON: {source}")]
	InvalidJson {
		#[source]
		source: serde_json::Error,
	},
	#[error("invalid component type {0:?}")]
	InvalidType(Option<String>),
	#[error("server component marker {0}")]
	InvalidServerMarker(&'static str),
	#[error("webassembly component marker {0}")]
	InvalidWebAssemblyMarker(&'static str),
	#[error("`{field}` of a webassembly component marker is not valid base64: {source}")]
	InvalidBase64 {
		field: &'static str,
		#[source]
		source: base64::DecodeError,
	},
	#[error("could not find an end marker for prerendered component {prerender_id:?}")]
	MissingEndMarker { prerender_id: String },
	#[error("invalid end of component marker: {0}")]
	InvalidEndMarker(&'static str),
	#[error("end marker prerender id {found:?} does not match start marker prerender id {expected:?}")]
	EndMarkerMismatch { expected: String, found: String },
	#[error("interactive component markers must not be placed directly under the document; statically rendered root elements cannot be parameterised")]
	MarkerOnDocument,
}

/// A caller broke the engine's usage contract. Meant to be caught during development.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
	#[error("an interactive router is already registered by {current:?}; {attempted:?} cannot claim route interception as well")]
	RouterAlreadyRegistered { current: BackendKind, attempted: BackendKind },
	#[error("no root component is awaiting resolution for selector {0}")]
	UnknownSelector(u64),
	#[error("root component for selector {selector_id} was already resolved as interactive component {component_id}")]
	AlreadyResolved { selector_id: u64, component_id: u64 },
}

/// Failure reported by a navigation host while fetching or reading a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
	#[error("request failed: {0}")]
	Request(String),
	#[error("failed to read response body: {0}")]
	Body(String),
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	#[error(transparent)]
	Contract(#[from] ContractError),
	#[error("failed to serialise root component operations: {0}")]
	Serialization(#[from] serde_json::Error),
}
