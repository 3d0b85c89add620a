use core::cell::{Cell, RefCell};
use std::rc::Rc;

type OnCancel = Box<dyn FnOnce()>;

#[derive(Default)]
struct Inner {
	cancelled: Cell<bool>,
	on_cancel: RefCell<Vec<OnCancel>>,
}

/// Cooperative cancellation for one navigation. Clones share state.
///
/// Code holding a token checks [`is_cancelled`](`CancellationToken::is_cancelled`) after every
/// suspension point and stops quietly once it is set.
#[derive(Clone, Default)]
pub struct CancellationToken(Rc<Inner>);

impl core::fmt::Debug for CancellationToken {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_tuple("CancellationToken").field(&self.is_cancelled()).finish()
	}
}

impl CancellationToken {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.0.cancelled.get()
	}

	/// Idempotent. Runs the registered callbacks on the first call only.
	pub fn cancel(&self) {
		if self.0.cancelled.replace(true) {
			return;
		}
		let callbacks = self.0.on_cancel.take();
		for callback in callbacks {
			callback();
		}
	}

	/// Runs `callback` on cancellation, or right away if already cancelled.
	///
	/// Hosts use this to abort in-flight requests.
	pub fn on_cancel(&self, callback: impl FnOnce() + 'static) {
		if self.is_cancelled() {
			callback();
		} else {
			self.0.on_cancel.borrow_mut().push(Box::new(callback));
		}
	}

	/// Whether `self` and `other` are clones of the same token.
	#[must_use]
	pub fn same_as(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
