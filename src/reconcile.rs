//! Root component reconciliation.
//!
//! Each logical root component moves through `Discovered → Assigned → Interactive → (Removed)`.
//! A reconciliation pass looks at every tracked component, computes at most one
//! [`RootComponentOperation`] for it and flushes the results once per backend.
//!
//! Passes only depend on the current document and on bookkeeping that is updated synchronously
//! while the pass runs, so running them repeatedly, or out of order, converges on the same state.

use crate::{
	descriptor::{BackendKind, ComponentDescriptor, ComponentKind},
	discover::Discoverer,
	dom::Dom,
	error::{ContractError, Error},
	navigation::NavigationStatus,
	operation::{serialize_batch, OperationBatches, RootComponentOperation},
	options::ReconcilerOptions,
	startup::{BackendResolution, ClientStartup},
};
use core::{mem, time::Duration};
use hashbrown::HashMap;
use tracing::{instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

/// The bridge to the interactive runtimes.
pub trait BackendHost {
	/// Whether `backend` is running and accepts root component operations.
	fn is_attached(&self, backend: BackendKind) -> bool;

	/// Starts `backend`. Not called again for the same backend unless it was stopped in between.
	///
	/// Once it is attached, notify the manager through [`RootComponentManager::backend_attached`]
	/// (or [`RootComponentManager::client_runtime_started`] for the client runtime).
	fn start_backend(&mut self, backend: BackendKind);

	/// Shuts `backend` down after its last root component was removed.
	///
	/// Only ever called for [`BackendKind::Server`]. It is started again once a new component needs it.
	fn stop_backend(&mut self, backend: BackendKind);

	/// Arranges for [`RootComponentManager::client_startup_timed_out`] to be called after `timeout`.
	fn arm_client_startup_timer(&mut self, timeout: Duration);

	/// Whether the client runtime is expected to start slowly, for example because its resources
	/// likely aren't cached yet. `auto` components then go to the server without waiting for the timer.
	fn predicts_slow_client_startup(&self) -> bool {
		false
	}

	/// Delivers one pass's operations for `backend` as a JSON array.
	fn update_root_components(&mut self, backend: BackendKind, batch: &str);
}

/// Coalesces "refresh everything" requests into a single deferred pass.
#[derive(Debug, Default)]
pub struct RefreshCoalescer {
	pending: bool,
}

impl RefreshCoalescer {
	/// Returns `true` iff no refresh was pending yet, i.e. the caller must schedule one.
	pub fn request(&mut self) -> bool {
		!mem::replace(&mut self.pending, true)
	}

	/// Consumes the pending request, if any.
	pub fn take(&mut self) -> bool {
		mem::replace(&mut self.pending, false)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct LogicalId(u64);

#[derive(Debug)]
struct RootComponent<N> {
	descriptor: ComponentDescriptor<N>,
	resolution: BackendResolution,
	assigned_backend: Option<BackendKind>,
	last_seen_unique_id: Option<u64>,
	interactive_component_id: Option<u64>,
	/// Another component took over the start node.
	superseded: bool,
}

/// Owns the tracked root components and talks to the backends on their behalf.
#[derive(Debug)]
pub struct RootComponentManager<N, H> {
	host: H,
	options: ReconcilerOptions,
	navigation: NavigationStatus,
	discoverer: Discoverer,
	components: HashMap<LogicalId, RootComponent<N>>,
	next_logical_id: u64,
	/// Selector ids of emitted `add`s that haven't been removed yet.
	selectors: HashMap<u64, LogicalId>,
	client_startup: ClientStartup,
	server_start_requested: bool,
	refresh: RefreshCoalescer,
}

impl<N, H> RootComponentManager<N, H>
where
	N: Clone + PartialEq + core::fmt::Debug,
	H: BackendHost,
{
	#[must_use]
	pub fn new(host: H, navigation: NavigationStatus, options: ReconcilerOptions) -> Self {
		Self {
			host,
			options,
			navigation,
			discoverer: Discoverer::new(),
			components: HashMap::new(),
			next_logical_id: 0,
			selectors: HashMap::new(),
			client_startup: ClientStartup::NotRequested,
			server_start_requested: false,
			refresh: RefreshCoalescer::default(),
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	#[must_use]
	pub fn client_startup(&self) -> ClientStartup {
		self.client_startup
	}

	/// Number of tracked logical root components.
	#[must_use]
	pub fn len(&self) -> usize {
		self.components.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	/// Re-discovers all markers in `dom`, registers them and runs a reconciliation pass.
	///
	/// # Errors
	///
	/// Malformed markers abort discovery before anything is registered.
	#[instrument(skip(self, dom))]
	pub fn on_document_updated<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), Error> {
		let descriptors = self.discoverer.discover_all(dom, &dom.document_node())?;
		self.register_descriptors(dom, descriptors);
		self.refresh_all(dom)
	}

	/// Matches freshly discovered descriptors against tracked components, or starts tracking them.
	///
	/// A descriptor identical to the one tracked for its start node changes nothing. Otherwise a keyed
	/// descriptor takes over the component of the same key and kind that either sat on the same start
	/// node or whose region has left the document. Anything else is a new component, and a component
	/// previously tracked on the same start node is removed.
	#[instrument(skip(self, dom, descriptors))]
	pub fn register_descriptors<D: Dom<Node = N>>(&mut self, dom: &D, descriptors: impl IntoIterator<Item = ComponentDescriptor<N>>) {
		for descriptor in descriptors {
			let span = trace_span!("Registering", unique_id = descriptor.unique_id(), kind = ?descriptor.kind());
			let _enter = span.enter();

			if self.components.values().any(|c| {
				!c.superseded
					&& c.descriptor.start() == descriptor.start()
					&& c.descriptor.end() == descriptor.end()
					&& c.descriptor.same_content(&descriptor)
			}) {
				trace!("Unchanged.");
				continue;
			}

			let kind = descriptor.kind();
			if let Some(key) = descriptor.key() {
				if let Some(component) = self.components.values_mut().find(|c| {
					!c.superseded
						&& c.descriptor.key() == Some(key)
						&& c.descriptor.kind() == kind
						&& (c.descriptor.start() == descriptor.start() || !dom.is_connected(c.descriptor.start()))
				}) {
					trace!(previous = component.descriptor.unique_id(), "Matched by key.");
					component.descriptor = descriptor;
					continue;
				}
				if STATIC_MAX_LEVEL >= Level::WARN
					&& self.components.values().any(|c| {
						!c.superseded && c.descriptor.key() == Some(key) && c.descriptor.start() != descriptor.start() && dom.is_connected(c.descriptor.start())
					}) {
					warn!("Another root component with the same key is still in the document. Keys should be unique per render.");
				}
			}

			if let Some(previous) = self.components.values_mut().find(|c| !c.superseded && c.descriptor.start() == descriptor.start()) {
				trace!(previous = previous.descriptor.unique_id(), "Region replaced by a different component.");
				previous.superseded = true;
			}

			let resolution = match kind {
				ComponentKind::Server => BackendResolution::Server,
				ComponentKind::WebAssembly => BackendResolution::WebAssembly,
				ComponentKind::Auto => BackendResolution::Unresolved,
			};
			if kind != ComponentKind::Server {
				// `auto` may still end up on the client, so the client runtime is started optimistically.
				self.start_client_runtime();
			}

			let id = LogicalId(self.next_logical_id);
			self.next_logical_id += 1;
			trace!(?id, "Tracking new root component.");
			self.components.insert(
				id,
				RootComponent {
					descriptor,
					resolution,
					assigned_backend: None,
					last_seen_unique_id: None,
					interactive_component_id: None,
					superseded: false,
				},
			);
		}
	}

	fn start_client_runtime(&mut self) {
		if !self.client_startup.advance(ClientStartup::Starting) {
			return;
		}
		trace!("Starting the client runtime.");
		self.host.start_backend(BackendKind::WebAssembly);
		if self.host.predicts_slow_client_startup() {
			trace!("Client runtime start-up predicted to be slow.");
			self.client_startup.advance(ClientStartup::SlowStart);
		} else {
			self.host.arm_client_startup_timer(self.options.client_startup_timeout());
		}
	}

	/// Runs a reconciliation pass over every tracked component.
	///
	/// # Errors
	///
	/// Only if an operation batch can't be serialised.
	#[instrument(skip(self, dom))]
	pub fn refresh_all<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), Error> {
		if self.client_startup < ClientStartup::Started && self.host.is_attached(BackendKind::WebAssembly) {
			self.client_startup.advance(ClientStartup::Started);
		}

		let mut ids: Vec<LogicalId> = self.components.keys().copied().collect();
		ids.sort_unstable();

		let mut batches = OperationBatches::default();
		for id in ids {
			if let Some((backend, operation)) = self.reconcile(dom, id) {
				batches.push(backend, operation);
			}
		}
		self.flush(batches)
	}

	/// Asks for a coalesced refresh. Returns `true` if the caller must schedule
	/// [`run_scheduled_refresh`](`RootComponentManager::run_scheduled_refresh`), e.g. on a microtask.
	pub fn request_refresh(&mut self) -> bool {
		self.refresh.request()
	}

	/// Runs the pass requested through [`request_refresh`](`RootComponentManager::request_refresh`), if still pending.
	///
	/// # Errors
	///
	/// See [`refresh_all`](`RootComponentManager::refresh_all`).
	pub fn run_scheduled_refresh<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), Error> {
		if self.refresh.take() {
			self.refresh_all(dom)
		} else {
			Ok(())
		}
	}

	/// Computes the single operation (if any) for one component and updates its bookkeeping.
	fn reconcile<D: Dom<Node = N>>(&mut self, dom: &D, id: LogicalId) -> Option<(BackendKind, RootComponentOperation)> {
		let Self {
			host,
			navigation,
			components,
			selectors,
			client_startup,
			server_start_requested,
			..
		} = self;

		let component = components.get_mut(&id)?;
		let unique_id = component.descriptor.unique_id();
		let span = trace_span!("Reconciling", ?id, unique_id);
		let _enter = span.enter();

		if component.superseded || !dom.is_connected(component.descriptor.start()) {
			return match (component.assigned_backend, component.interactive_component_id) {
				(Some(backend), Some(component_id)) => {
					trace!(component_id, "Region is gone; removing.");
					selectors.retain(|_, logical| *logical != id);
					components.remove(&id);
					Some((backend, RootComponentOperation::Remove { component_id }))
				}
				(Some(_), None) => {
					// The backend may still resolve the pending `add`; the `remove` goes out then.
					trace!("Region is gone before the component became interactive.");
					None
				}
				(None, _) => {
					trace!("Region is gone before activation; forgetting it.");
					components.remove(&id);
					None
				}
			};
		}

		if component.last_seen_unique_id == Some(unique_id) {
			return None;
		}

		let backend = match component.assigned_backend {
			Some(backend) => {
				let component_id = match component.interactive_component_id {
					Some(component_id) => component_id,
					None => {
						trace!("Update deferred until the backend confirms the component.");
						return None;
					}
				};
				let marker = component.descriptor.to_marker(backend)?;
				component.last_seen_unique_id = Some(unique_id);
				trace!(component_id, "Updating.");
				return Some((backend, RootComponentOperation::Update { component_id, marker }));
			}
			None => {
				if navigation.is_in_flight() {
					trace!("Activation suppressed while a navigation is in flight.");
					return None;
				}
				let backend = match component.resolution.backend() {
					Some(backend) => backend,
					None => match client_startup.auto_backend() {
						Some(backend) => {
							trace!(?backend, "Resolved `auto` component.");
							component.resolution.resolve(backend)
						}
						None => {
							trace!("`auto` resolution deferred.");
							return None;
						}
					},
				};
				if !host.is_attached(backend) {
					if backend == BackendKind::Server && !mem::replace(server_start_requested, true) {
						trace!("Starting the server backend.");
						host.start_backend(BackendKind::Server);
					}
					trace!(?backend, "Backend not attached yet.");
					return None;
				}
				backend
			}
		};

		let marker = match component.descriptor.to_marker(backend) {
			Some(marker) => marker,
			None => {
				warn!(?backend, kind = ?component.descriptor.kind(), "Descriptor can't be hosted by its resolved backend.");
				return None;
			}
		};
		component.assigned_backend = Some(backend);
		component.last_seen_unique_id = Some(unique_id);
		selectors.insert(unique_id, id);
		trace!(?backend, selector_id = unique_id, "Adding.");
		Some((backend, RootComponentOperation::Add { selector_id: unique_id, marker }))
	}

	fn flush(&mut self, batches: OperationBatches) -> Result<(), Error> {
		let mut server_removed = false;
		for (backend, operations) in batches.into_batches() {
			let batch = serialize_batch(&operations)?;
			trace!(?backend, count = operations.len(), "Flushing root component operations.");
			if STATIC_MAX_LEVEL >= Level::TRACE && cfg!(feature = "dangerous-logging") {
				trace!("Batch: {}", batch);
			}
			server_removed |= backend == BackendKind::Server && operations.iter().any(|operation| matches!(operation, RootComponentOperation::Remove { .. }));
			self.host.update_root_components(backend, &batch);
		}

		if server_removed
			&& !self
				.components
				.values()
				.any(|c| c.assigned_backend == Some(BackendKind::Server) || c.resolution.backend() == Some(BackendKind::Server))
		{
			trace!("Last server component removed; stopping the server backend.");
			self.server_start_requested = false;
			self.host.stop_backend(BackendKind::Server);
		}
		Ok(())
	}

	/// Called by a backend once it instantiated the component it was asked to `add` as `selector_id`.
	///
	/// Parameter changes that arrived in the meantime are flushed right away.
	///
	/// # Errors
	///
	/// [`ContractError::UnknownSelector`] if no `add` with that selector is outstanding,
	/// [`ContractError::AlreadyResolved`] if it was resolved before.
	#[instrument(skip(self, dom))]
	pub fn resolve_root_component<D: Dom<Node = N>>(&mut self, dom: &D, selector_id: u64, component_id: u64) -> Result<ComponentDescriptor<N>, Error> {
		let id = *self.selectors.get(&selector_id).ok_or(ContractError::UnknownSelector(selector_id))?;
		let component = self.components.get_mut(&id).ok_or(ContractError::UnknownSelector(selector_id))?;
		if let Some(existing) = component.interactive_component_id {
			return Err(ContractError::AlreadyResolved { selector_id, component_id: existing }.into());
		}
		component.interactive_component_id = Some(component_id);
		let descriptor = component.descriptor.clone();

		let mut batches = OperationBatches::default();
		if let Some((backend, operation)) = self.reconcile(dom, id) {
			batches.push(backend, operation);
		}
		self.flush(batches)?;
		Ok(descriptor)
	}

	/// A backend became able to accept operations.
	///
	/// # Errors
	///
	/// See [`refresh_all`](`RootComponentManager::refresh_all`).
	#[instrument(skip(self, dom))]
	pub fn backend_attached<D: Dom<Node = N>>(&mut self, dom: &D, backend: BackendKind) -> Result<(), Error> {
		if backend == BackendKind::WebAssembly {
			self.client_startup.advance(ClientStartup::Started);
		}
		self.refresh_all(dom)
	}

	/// The client runtime finished starting. `auto` components resolved to the server stay there.
	///
	/// # Errors
	///
	/// See [`refresh_all`](`RootComponentManager::refresh_all`).
	pub fn client_runtime_started<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), Error> {
		self.backend_attached(dom, BackendKind::WebAssembly)
	}

	/// The start-up timer fired. If the client runtime is still starting, pending `auto`
	/// components give up on it and go to the server.
	///
	/// # Errors
	///
	/// See [`refresh_all`](`RootComponentManager::refresh_all`).
	#[instrument(skip(self, dom))]
	pub fn client_startup_timed_out<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), Error> {
		if self.client_startup == ClientStartup::Starting && self.client_startup.advance(ClientStartup::SlowStart) {
			trace!("Client runtime did not start quickly.");
			self.refresh_all(dom)
		} else {
			Ok(())
		}
	}
}
