use crate::{descriptor::BackendKind, marker::Marker};
use serde::Serialize;

/// One instruction for a backend, serialised as part of a JSON array per flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RootComponentOperation {
	/// Instantiate a component. The backend answers with
	/// [`resolve_root_component`](`crate::reconcile::RootComponentManager::resolve_root_component`) for `selector_id`.
	#[serde(rename_all = "camelCase")]
	Add { selector_id: u64, marker: Marker },
	#[serde(rename_all = "camelCase")]
	Update { component_id: u64, marker: Marker },
	#[serde(rename_all = "camelCase")]
	Remove { component_id: u64 },
}

/// Operations collected during one reconciliation pass, grouped by destination.
#[derive(Debug, Default)]
pub(crate) struct OperationBatches {
	server: Vec<RootComponentOperation>,
	webassembly: Vec<RootComponentOperation>,
}

impl OperationBatches {
	pub fn push(&mut self, backend: BackendKind, operation: RootComponentOperation) {
		match backend {
			BackendKind::Server => self.server.push(operation),
			BackendKind::WebAssembly => self.webassembly.push(operation),
		}
	}

	/// Non-empty batches in flush order.
	pub fn into_batches(self) -> impl Iterator<Item = (BackendKind, Vec<RootComponentOperation>)> {
		[(BackendKind::Server, self.server), (BackendKind::WebAssembly, self.webassembly)]
			.into_iter()
			.filter(|(_, operations)| !operations.is_empty())
	}
}

/// The wire form handed to [`BackendHost::update_root_components`](`crate::reconcile::BackendHost::update_root_components`).
///
/// # Errors
///
/// Only if serialisation itself fails.
pub fn serialize_batch(operations: &[RootComponentOperation]) -> Result<String, serde_json::Error> {
	serde_json::to_string(operations)
}
