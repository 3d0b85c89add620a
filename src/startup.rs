//! The client runtime start-up race that decides where `auto` components go.

use crate::descriptor::BackendKind;

/// Progress of the client (webassembly) runtime's start-up. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ClientStartup {
	#[default]
	NotRequested,
	Starting,
	/// Still starting, but it took (or is predicted to take) too long for `auto` components to wait.
	SlowStart,
	Started,
}

impl ClientStartup {
	/// The backend an unresolved `auto` component goes to right now, or [`None`] to keep waiting.
	#[must_use]
	pub fn auto_backend(self) -> Option<BackendKind> {
		match self {
			Self::Started => Some(BackendKind::WebAssembly),
			Self::SlowStart => Some(BackendKind::Server),
			Self::NotRequested | Self::Starting => None,
		}
	}

	/// Advances to `next` unless already past it. Returns whether anything changed.
	pub(crate) fn advance(&mut self, next: Self) -> bool {
		if next > *self {
			*self = next;
			true
		} else {
			false
		}
	}
}

/// Where a component's backend choice stands. Once resolved, it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendResolution {
	#[default]
	Unresolved,
	Server,
	WebAssembly,
}

impl BackendResolution {
	#[must_use]
	pub fn backend(self) -> Option<BackendKind> {
		match self {
			Self::Unresolved => None,
			Self::Server => Some(BackendKind::Server),
			Self::WebAssembly => Some(BackendKind::WebAssembly),
		}
	}

	/// Resolves to `backend` if still unresolved, and returns the (possibly earlier) resolution.
	pub(crate) fn resolve(&mut self, backend: BackendKind) -> BackendKind {
		if *self == Self::Unresolved {
			*self = match backend {
				BackendKind::Server => Self::Server,
				BackendKind::WebAssembly => Self::WebAssembly,
			};
		}
		self.backend().unwrap_or(backend)
	}
}
