//! Shared navigation vocabulary: URI space checks, link click classification, the interactive
//! router registration and navigation listeners.

use crate::{descriptor::BackendKind, error::ContractError};
use core::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{instrument, trace};

/// `true` iff `href` is `base_uri` (minus anything after its last `/`) or a `/`-, `?`- or `#`-delimited descendant of it.
#[must_use]
pub fn is_within_base_uri_space(base_uri: &str, href: &str) -> bool {
	let base = to_base_uri_without_trailing_slash(base_uri);
	match href.strip_prefix(base) {
		Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
		None => false,
	}
}

fn to_base_uri_without_trailing_slash(base_uri: &str) -> &str {
	base_uri.rfind('/').map_or(base_uri, |last_slash| &base_uri[..last_slash])
}

/// `href` without its fragment.
#[must_use]
pub fn strip_fragment(href: &str) -> &str {
	href.split_once('#').map_or(href, |(before, _)| before)
}

/// The non-empty fragment of `href`, without the `#`.
#[must_use]
pub fn fragment(href: &str) -> Option<&str> {
	href.split_once('#').map(|(_, fragment)| fragment).filter(|fragment| !fragment.is_empty())
}

/// Whether going from `current` to `target` only changes the fragment, with `target` naming one.
#[must_use]
pub fn is_same_page_with_hash(current: &str, target: &str) -> bool {
	target.contains('#') && strip_fragment(current) == strip_fragment(target)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Modifiers {
	pub ctrl: bool,
	pub shift: bool,
	pub alt: bool,
	pub meta: bool,
}

impl Modifiers {
	#[must_use]
	pub fn any(self) -> bool {
		self.ctrl || self.shift || self.alt || self.meta
	}
}

/// An `<a>` (HTML or SVG) found on a click's composed event path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
	/// Already resolved against the document base URI. [`None`] if the anchor has no `href` attribute.
	pub href: Option<String>,
	pub target: Option<String>,
	pub download: bool,
}

/// An entry of a click's composed event path, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
	Anchor(Anchor),
	Other,
}

/// What link interception needs to know about a click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorClick {
	/// `0` is the primary button.
	pub button: i16,
	pub modifiers: Modifiers,
	pub default_prevented: bool,
	/// The composed path, which crosses shadow roots, innermost target first.
	pub path: Vec<PathEntry>,
}

/// Returns the absolute href a click should be intercepted for, if any.
///
/// Clicks that the browser would turn into a new tab or window, or a download, are left alone.
#[must_use]
pub fn classify_anchor_click(click: &AnchorClick) -> Option<&str> {
	if click.button != 0 || click.modifiers.any() || click.default_prevented {
		return None;
	}
	let anchor = click.path.iter().find_map(|entry| match entry {
		PathEntry::Anchor(anchor) => Some(anchor),
		PathEntry::Other => None,
	})?;
	let same_frame = matches!(anchor.target.as_deref(), None | Some("" | "_self"));
	if !same_frame || anchor.download {
		return None;
	}
	anchor.href.as_deref()
}

thread_local! {
	static INTERACTIVE_ROUTER: Cell<Option<BackendKind>> = Cell::new(None);
}

/// Claims client-side route interception for `backend`.
///
/// Re-registering the same backend is allowed.
///
/// # Errors
///
/// Iff a different backend already holds the registration.
#[instrument]
pub fn register_interactive_router(backend: BackendKind) -> Result<(), ContractError> {
	INTERACTIVE_ROUTER.with(|router| match router.get() {
		Some(current) if current != backend => Err(ContractError::RouterAlreadyRegistered { current, attempted: backend }),
		_ => {
			router.set(Some(backend));
			Ok(())
		}
	})
}

/// Releases the registration if `backend` holds it.
#[instrument]
pub fn unregister_interactive_router(backend: BackendKind) {
	INTERACTIVE_ROUTER.with(|router| {
		if router.get() == Some(backend) {
			router.set(None);
		}
	});
}

#[must_use]
pub fn interactive_router() -> Option<BackendKind> {
	INTERACTIVE_ROUTER.with(Cell::get)
}

/// Whether an interactive router currently owns link and history interception.
///
/// Check this when an event is dispatched: routers may register at any time.
#[must_use]
pub fn has_interactive_router() -> bool {
	interactive_router().is_some()
}

/// Whether a streamed navigation is currently in flight. Shared between the navigator, which sets
/// it, and the reconciler, which suppresses new activations while it is set.
#[derive(Debug, Clone, Default)]
pub struct NavigationStatus(Rc<Cell<bool>>);

impl NavigationStatus {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn is_in_flight(&self) -> bool {
		self.0.get()
	}

	pub fn set_in_flight(&self, in_flight: bool) {
		self.0.set(in_flight);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent<'a> {
	Started { href: &'a str },
	/// The new content is in place and reconciliation was triggered.
	DocumentUpdated { href: &'a str },
	/// The response was fully consumed.
	Completed { href: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(NavigationEvent<'_>)>;

/// Subscribers to enhanced navigation progress.
#[derive(Default)]
pub struct NavigationListeners {
	next_id: Cell<u64>,
	listeners: RefCell<Vec<(ListenerId, Listener)>>,
}

impl core::fmt::Debug for NavigationListeners {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("NavigationListeners").field("count", &self.listeners.borrow().len()).finish()
	}
}

impl NavigationListeners {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&self, listener: impl Fn(NavigationEvent<'_>) + 'static) -> ListenerId {
		let id = ListenerId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.listeners.borrow_mut().push((id, Rc::new(listener)));
		id
	}

	/// Returns whether a listener was removed.
	pub fn remove(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(existing, _)| *existing != id);
		listeners.len() != before
	}

	/// Listeners may add or remove listeners while being notified. Such changes apply from the next event on.
	pub fn notify(&self, event: NavigationEvent<'_>) {
		let snapshot: Vec<Listener> = self.listeners.borrow().iter().map(|(_, listener)| Rc::clone(listener)).collect();
		trace!("Notifying {} navigation listener(s) of {:?}.", snapshot.len(), event);
		for listener in snapshot {
			listener(event);
		}
	}
}
