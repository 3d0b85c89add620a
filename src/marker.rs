//! The comment marker wire format.
//!
//! A start marker is a comment whose trimmed data reads `Framework:{json}`, where the JSON object has
//! a `type` of `"server"`, `"webassembly"` or `"auto"`. A prerendered region is closed by another
//! such comment holding exactly `{"prerenderId": …}`.
//!
//! The same [`Marker`] shape, minus the DOM, is what backends receive in `add` and `update` operations.

use crate::{
	descriptor::{ComponentKey, Payload, ServerPayload, WebAssemblyPayload},
	error::ProtocolError,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MARKER_PREFIX: &str = "Framework:";
pub const PERSISTED_STATE_PREFIX: &str = "Framework-Component-State:";

/// Serialised component marker, as handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Marker {
	#[serde(rename_all = "camelCase")]
	Server {
		#[serde(skip_serializing_if = "Option::is_none")]
		prerender_id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		key: Option<ComponentKey>,
		sequence: u32,
		descriptor: String,
	},
	#[serde(rename_all = "camelCase")]
	WebAssembly {
		#[serde(skip_serializing_if = "Option::is_none")]
		prerender_id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		key: Option<ComponentKey>,
		assembly: String,
		type_name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		parameter_definitions: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		parameter_values: Option<String>,
	},
}

/// A parsed start marker, before it is bound to DOM nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartMarker {
	pub prerender_id: Option<String>,
	pub key: Option<ComponentKey>,
	pub payload: Payload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarker {
	#[serde(rename = "type")]
	kind: Option<String>,
	prerender_id: Option<String>,
	key: Option<ComponentKey>,
	sequence: Option<Value>,
	descriptor: Option<String>,
	assembly: Option<String>,
	type_name: Option<String>,
	parameter_definitions: Option<String>,
	parameter_values: Option<String>,
}

/// Extracts the JSON payload of a framework marker comment, if `comment_data` is one.
pub(crate) fn marker_json(comment_data: &str) -> Option<&str> {
	comment_data.trim().strip_prefix(MARKER_PREFIX).map(str::trim).filter(|json| !json.is_empty())
}

/// Extracts the base64 payload of a persisted state comment, if `comment_data` is one.
pub(crate) fn persisted_state(comment_data: &str) -> Option<&str> {
	comment_data
		.trim_start()
		.strip_prefix(PERSISTED_STATE_PREFIX)
		.filter(|state| !state.is_empty() && state.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')))
}

pub(crate) fn parse_start_marker(json: &str) -> Result<StartMarker, ProtocolError> {
	let raw: RawMarker = serde_json::from_str(json).map_err(|source| ProtocolError::InvalidJson { source })?;
	let payload = match raw.kind.as_deref() {
		Some("server") => Payload::Server(server_payload(&raw)?),
		Some("webassembly") => Payload::WebAssembly(webassembly_payload(&raw)?),
		Some("auto") => Payload::Auto {
			server: server_payload(&raw)?,
			webassembly: webassembly_payload(&raw)?,
		},
		_ => return Err(ProtocolError::InvalidType(raw.kind)),
	};
	Ok(StartMarker {
		prerender_id: raw.prerender_id.filter(|id| !id.is_empty()),
		key: raw.key,
		payload,
	})
}

fn server_payload(raw: &RawMarker) -> Result<ServerPayload, ProtocolError> {
	let descriptor = match raw.descriptor.as_deref() {
		Some(descriptor) if !descriptor.is_empty() => descriptor.to_owned(),
		_ => return Err(ProtocolError::InvalidServerMarker("must have a non-empty `descriptor`")),
	};
	let sequence = match &raw.sequence {
		None => return Err(ProtocolError::InvalidServerMarker("must have a `sequence`")),
		Some(sequence) => sequence
			.as_u64()
			.and_then(|sequence| u32::try_from(sequence).ok())
			.ok_or(ProtocolError::InvalidServerMarker("`sequence` must be a non-negative integer"))?,
	};
	Ok(ServerPayload { sequence, descriptor })
}

fn webassembly_payload(raw: &RawMarker) -> Result<WebAssemblyPayload, ProtocolError> {
	fn required(value: &Option<String>, message: &'static str) -> Result<String, ProtocolError> {
		match value.as_deref() {
			Some(value) if !value.is_empty() => Ok(value.to_owned()),
			_ => Err(ProtocolError::InvalidWebAssemblyMarker(message)),
		}
	}

	fn decode(value: &Option<String>, field: &'static str) -> Result<Option<Vec<u8>>, ProtocolError> {
		value
			.as_deref()
			.map(|encoded| STANDARD.decode(encoded).map_err(|source| ProtocolError::InvalidBase64 { field, source }))
			.transpose()
	}

	Ok(WebAssemblyPayload {
		assembly: required(&raw.assembly, "must have a non-empty `assembly`")?,
		type_name: required(&raw.type_name, "must have a non-empty `typeName`")?,
		parameter_definitions: decode(&raw.parameter_definitions, "parameterDefinitions")?,
		parameter_values: decode(&raw.parameter_values, "parameterValues")?,
	})
}

/// Checks that `json` closes the region opened with `expected_prerender_id`.
pub(crate) fn validate_end_marker(json: &str, expected_prerender_id: &str) -> Result<(), ProtocolError> {
	let object: Map<String, Value> = serde_json::from_str(json).map_err(|source| ProtocolError::InvalidJson { source })?;
	if object.len() != 1 {
		return Err(ProtocolError::InvalidEndMarker("must contain exactly one key"));
	}
	let found = match object.get("prerenderId") {
		Some(Value::String(id)) if !id.is_empty() => id,
		_ => return Err(ProtocolError::InvalidEndMarker("must have a value for `prerenderId`")),
	};
	if found != expected_prerender_id {
		return Err(ProtocolError::EndMarkerMismatch {
			expected: expected_prerender_id.to_owned(),
			found: found.clone(),
		});
	}
	Ok(())
}
