//! Streamed ("enhanced") page navigation.
//!
//! A navigation fetches the destination with a header asking the server to frame its response,
//! merges the first frame onto the live document and appends every further frame as a streaming
//! update. Only one navigation is live at a time: starting another cancels the previous one, which
//! then stops touching the document at its next suspension point.

use crate::{
	cancel::CancellationToken,
	error::NetworkError,
	framing::{boundary_marker, FrameSplitter, Utf8Decoder},
	navigation::{self, AnchorClick, NavigationEvent, NavigationListeners, NavigationStatus},
	options::NavigationOptions,
};
use core::cell::RefCell;
use futures_util::{Stream, StreamExt};
use tracing::{error, instrument, trace, warn};

/// What came back for a navigation request, with the body still unread.
#[derive(Debug)]
pub struct NavigationResponse<B> {
	pub status: u16,
	pub status_text: String,
	/// The final URL, after redirects the transport followed on its own.
	pub url: String,
	pub redirected: bool,
	pub headers: Vec<(String, String)>,
	/// [`None`] for responses without a body.
	pub body: Option<B>,
}

impl<B> NavigationResponse<B> {
	/// Case-insensitive header lookup.
	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}

	#[must_use]
	pub fn is_html(&self) -> bool {
		self.header("content-type").map_or(false, |content_type| content_type.trim_start().to_ascii_lowercase().starts_with("text/html"))
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// The browser-facing side of streamed navigation: networking, history and the document.
#[allow(async_fn_in_trait)]
pub trait NavigationHost {
	type Body: Stream<Item = Result<Vec<u8>, NetworkError>> + Unpin;

	/// Issues a GET for `href`. The host should abort the request when `cancellation` fires.
	async fn fetch(&self, href: &str, headers: &[(&str, &str)], cancellation: &CancellationToken) -> Result<NavigationResponse<Self::Body>, NetworkError>;

	/// The absolute URL of the current history entry.
	fn current_href(&self) -> String;
	fn base_uri(&self) -> String;

	fn push_history_entry(&self, href: &str);
	fn replace_history_entry(&self, href: &str);

	/// Leaves the page through a regular browser navigation.
	fn navigate_full(&self, href: &str);

	/// Parses `html` as a document and merges it onto the live one.
	fn merge_document(&self, html: &str);

	/// Replaces the document with a minimal error message.
	fn show_error_document(&self, message: &str);

	/// Parses `markup` and appends it to the document as a streaming update.
	fn append_streaming_fragment(&self, markup: &str);

	/// Scrolls the element with id `fragment` into view. Returns whether it was found.
	fn scroll_to_fragment(&self, fragment: &str) -> bool;

	/// The document changed and root components must be reconciled.
	fn document_updated(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
	Completed,
	Cancelled,
	/// The browser was sent elsewhere with a full navigation.
	Abandoned,
}

#[derive(Debug)]
pub struct StreamingNavigator<H> {
	host: H,
	options: NavigationOptions,
	status: NavigationStatus,
	listeners: NavigationListeners,
	current: RefCell<Option<CancellationToken>>,
	content_url: RefCell<String>,
}

impl<H: NavigationHost> StreamingNavigator<H> {
	#[must_use]
	pub fn new(host: H, options: NavigationOptions, status: NavigationStatus) -> Self {
		let content_url = RefCell::new(host.current_href());
		Self {
			host,
			options,
			status,
			listeners: NavigationListeners::new(),
			current: RefCell::new(None),
			content_url,
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn listeners(&self) -> &NavigationListeners {
		&self.listeners
	}

	pub fn status(&self) -> &NavigationStatus {
		&self.status
	}

	/// Whether streamed navigation handles events right now.
	///
	/// An interactive router may register at any point, so this is evaluated per event.
	#[must_use]
	pub fn is_active(&self) -> bool {
		self.options.enhanced_navigation && !navigation::has_interactive_router()
	}

	/// Decides whether to take over a link click. If so, pushes the history entry and returns the
	/// destination: the caller must prevent the event's default action and then
	/// [`perform_navigation`](`StreamingNavigator::perform_navigation`) to it.
	#[must_use]
	pub fn intercept_anchor_click(&self, click: &AnchorClick) -> Option<String> {
		if !self.is_active() {
			return None;
		}
		let href = navigation::classify_anchor_click(click)?;
		if !navigation::is_within_base_uri_space(&self.host.base_uri(), href) {
			trace!("Leaving external link to the browser.");
			return None;
		}
		self.host.push_history_entry(href);
		Some(href.to_owned())
	}

	/// Decides whether to handle a back/forward traversal. If so, returns the destination to
	/// [`perform_navigation`](`StreamingNavigator::perform_navigation`) to.
	#[must_use]
	pub fn intercept_history_traversal(&self) -> Option<String> {
		self.is_active().then(|| self.host.current_href())
	}

	/// Navigates to `href` (absolute). Never fails: problems end in a full browser navigation or
	/// a minimal error document, and being superseded by a later navigation ends it quietly.
	#[instrument(skip(self, href), fields(href = redact(href)))]
	pub async fn perform_navigation(&self, href: &str) {
		let content_url = self.content_url.borrow().clone();
		if navigation::is_same_page_with_hash(&content_url, href) {
			trace!("Same page, different fragment: scrolling only.");
			if let Some(previous) = self.current.take() {
				previous.cancel();
				self.status.set_in_flight(false);
			}
			*self.content_url.borrow_mut() = href.to_owned();
			self.scroll_to_fragment(href);
			return;
		}

		let token = CancellationToken::new();
		if let Some(previous) = self.current.replace(Some(token.clone())) {
			trace!("Cancelling the previous navigation.");
			previous.cancel();
		}
		self.status.set_in_flight(true);
		self.listeners.notify(NavigationEvent::Started { href });

		let outcome = self.navigate(href, &token).await;
		trace!(?outcome);

		if !self.current.borrow().as_ref().map_or(false, |current| current.same_as(&token)) {
			return;
		}
		*self.current.borrow_mut() = None;
		self.status.set_in_flight(false);

		if let Outcome::Completed = outcome {
			let href = self.content_url.borrow().clone();
			self.host.document_updated();
			self.listeners.notify(NavigationEvent::DocumentUpdated { href: &href });
			self.scroll_to_fragment(&href);
			self.listeners.notify(NavigationEvent::Completed { href: &href });
		}
	}

	fn scroll_to_fragment(&self, href: &str) {
		if let Some(fragment) = navigation::fragment(href) {
			if !self.host.scroll_to_fragment(fragment) {
				trace!("No element to scroll to.");
			}
		}
	}

	async fn navigate(&self, href: &str, token: &CancellationToken) -> Outcome {
		let headers = [(self.options.request_header_name.as_str(), self.options.request_header_value.as_str())];
		let response = match self.host.fetch(href, &headers, token).await {
			Ok(response) => response,
			Err(_) if token.is_cancelled() => return Outcome::Cancelled,
			Err(error) => {
				error!("Navigation request failed: {}", error);
				self.host.navigate_full(href);
				return Outcome::Abandoned;
			}
		};
		if token.is_cancelled() {
			return Outcome::Cancelled;
		}

		if let Some(location) = response.header(&self.options.redirect_header_name) {
			trace!(location = redact(location), "Server requested an external redirect.");
			self.host.navigate_full(location);
			return Outcome::Abandoned;
		}

		let destination = if response.redirected && !response.url.is_empty() && response.url != href {
			self.host.replace_history_entry(&response.url);
			response.url.clone()
		} else {
			href.to_owned()
		};

		let mut frames = FrameSink {
			host: &self.host,
			href,
			is_html: response.is_html(),
			is_success: response.is_success(),
			status: response.status,
			status_text: &response.status_text,
			initial_done: false,
		};

		let marker = response.header(&self.options.framing_header_name).filter(|token| !token.is_empty()).map(boundary_marker);
		if marker.is_none() {
			trace!("Response is not framed; treating it as a single document.");
		}

		if let Some(mut body) = response.body {
			let mut decoder = Utf8Decoder::new();
			let mut splitter = marker.map(FrameSplitter::new);
			let mut whole = String::new();

			while let Some(chunk) = body.next().await {
				if token.is_cancelled() {
					return Outcome::Cancelled;
				}
				let chunk = match chunk {
					Ok(chunk) => chunk,
					Err(error) => {
						error!("Reading the navigation response failed: {}", error);
						self.host.navigate_full(href);
						return Outcome::Abandoned;
					}
				};
				let text = decoder.decode(&chunk);
				match &mut splitter {
					Some(splitter) => {
						for frame in splitter.push(&text) {
							if !frames.accept(&frame) {
								return Outcome::Abandoned;
							}
						}
					}
					None => whole.push_str(&text),
				}
			}
			if token.is_cancelled() {
				return Outcome::Cancelled;
			}

			let tail = decoder.finish();
			match splitter {
				Some(mut splitter) => {
					let mut rest = splitter.push(&tail);
					rest.extend(splitter.finish());
					for frame in rest {
						if !frames.accept(&frame) {
							return Outcome::Abandoned;
						}
					}
				}
				None => {
					whole.push_str(&tail);
					if !frames.accept(&whole) {
						return Outcome::Abandoned;
					}
				}
			}
		}

		if !frames.initial_done && !frames.accept("") {
			return Outcome::Abandoned;
		}

		*self.content_url.borrow_mut() = destination;
		Outcome::Completed
	}
}

/// Routes frames of one response: the first is the initial document, the rest are streaming updates.
struct FrameSink<'a, H> {
	host: &'a H,
	href: &'a str,
	is_html: bool,
	is_success: bool,
	status: u16,
	status_text: &'a str,
	initial_done: bool,
}

impl<H: NavigationHost> FrameSink<'_, H> {
	/// Returns `false` if the navigation was abandoned.
	fn accept(&mut self, frame: &str) -> bool {
		if self.initial_done {
			if frame.trim().is_empty() {
				trace!("Skipping empty streaming update.");
			} else {
				trace!(len = frame.len(), "Appending streaming update.");
				self.host.append_streaming_fragment(frame);
			}
			return true;
		}
		self.initial_done = true;

		if self.is_html && !frame.is_empty() {
			trace!(len = frame.len(), "Merging initial document.");
			self.host.merge_document(frame);
			true
		} else if !self.is_success && frame.is_empty() {
			self.host.show_error_document(&format!("Error: {} {}", self.status, self.status_text));
			true
		} else {
			warn!("Navigation response can't be merged (status {}); reloading the page instead.", self.status);
			// Going through a different URL makes the browser actually reload the same address.
			self.host.replace_history_entry(&format!("{}?", self.href));
			self.host.navigate_full(self.href);
			false
		}
	}
}

fn redact(href: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		href
	} else {
		href.split(['?', '#']).next().unwrap_or_default()
	}
}
