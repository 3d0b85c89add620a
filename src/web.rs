//! Browser bindings through [`web_sys`].

use crate::{
	cancel::CancellationToken,
	dom::{Dom, NodeKind},
	error::NetworkError,
	navigation::{Anchor, AnchorClick, Modifiers, PathEntry},
	navigator::{NavigationHost, NavigationResponse},
};
use core::time::Duration;
use futures_util::{stream::LocalBoxStream, StreamExt};
use js_sys::{Array, Reflect, Uint8Array};
use tracing::{error, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Headers, HtmlTemplateElement, ReadableStream, ReadableStreamDefaultReader, RequestInit, Response};

fn describe(value: &JsValue) -> String {
	value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// The live document, seen through [`Dom`].
#[derive(Debug, Clone)]
pub struct WebDocument {
	document: web_sys::Document,
}

impl WebDocument {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self { document }
	}

	/// The document of the current window, if there is one.
	#[must_use]
	pub fn current() -> Option<Self> {
		web_sys::window()?.document().map(Self::new)
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}
}

impl Dom for WebDocument {
	type Node = web_sys::Node;

	fn document_node(&self) -> web_sys::Node {
		self.document.clone().into()
	}

	fn node_kind(&self, node: &web_sys::Node) -> NodeKind {
		match node.node_type() {
			web_sys::Node::DOCUMENT_NODE => NodeKind::Document,
			web_sys::Node::ELEMENT_NODE => NodeKind::Element,
			web_sys::Node::TEXT_NODE => NodeKind::Text,
			web_sys::Node::COMMENT_NODE => NodeKind::Comment,
			_ => NodeKind::Other,
		}
	}

	fn comment_data(&self, node: &web_sys::Node) -> Option<String> {
		node.dyn_ref::<web_sys::Comment>().map(|comment| comment.data())
	}

	fn first_child(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.first_child()
	}

	fn next_sibling(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.next_sibling()
	}

	fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.parent_node()
	}

	fn is_connected(&self, node: &web_sys::Node) -> bool {
		node.is_connected()
	}

	fn detach(&mut self, node: &web_sys::Node) {
		if let Some(parent) = node.parent_node() {
			if let Err(error) = parent.remove_child(node) {
				error!("Failed to detach node: {:?}", error);
			}
		}
	}
}

type MergeDocument = Box<dyn Fn(&web_sys::Document, &web_sys::Document)>;

/// [`NavigationHost`] for the current window.
///
/// Merging a parsed document onto the live one is delegated to `merge`, the same goes for the
/// reaction to document updates (usually a reconciliation pass).
pub struct WebNavigationHost {
	window: web_sys::Window,
	document: web_sys::Document,
	merge: MergeDocument,
	document_updated: Box<dyn Fn()>,
}

impl core::fmt::Debug for WebNavigationHost {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("WebNavigationHost").field("document", &self.document).finish_non_exhaustive()
	}
}

impl WebNavigationHost {
	/// [`None`] outside of a window context.
	#[must_use]
	pub fn new(merge: impl Fn(&web_sys::Document, &web_sys::Document) + 'static, document_updated: impl Fn() + 'static) -> Option<Self> {
		let window = web_sys::window()?;
		let document = window.document()?;
		Some(Self {
			window,
			document,
			merge: Box::new(merge),
			document_updated: Box::new(document_updated),
		})
	}

	fn history(&self) -> Option<web_sys::History> {
		match self.window.history() {
			Ok(history) => Some(history),
			Err(error) => {
				error!("No history available: {:?}", error);
				None
			}
		}
	}
}

impl NavigationHost for WebNavigationHost {
	type Body = LocalBoxStream<'static, Result<Vec<u8>, NetworkError>>;

	async fn fetch(&self, href: &str, headers: &[(&str, &str)], cancellation: &CancellationToken) -> Result<NavigationResponse<Self::Body>, NetworkError> {
		let request_error = |error: JsValue| NetworkError::Request(describe(&error));

		let controller = AbortController::new().map_err(request_error)?;
		{
			let controller = controller.clone();
			cancellation.on_cancel(move || controller.abort());
		}

		let request_headers = Headers::new().map_err(request_error)?;
		for (name, value) in headers {
			request_headers.append(name, value).map_err(request_error)?;
		}
		let init = RequestInit::new();
		init.set_method("GET");
		init.set_headers(&request_headers);
		init.set_signal(Some(&controller.signal()));

		let response: Response = JsFuture::from(self.window.fetch_with_str_and_init(href, &init))
			.await
			.map_err(request_error)?
			.dyn_into()
			.map_err(request_error)?;

		let mut response_headers = Vec::new();
		match js_sys::try_iter(response.headers().as_ref()) {
			Ok(Some(entries)) => {
				for entry in entries.flatten() {
					let entry: Array = entry.unchecked_into();
					if let (Some(name), Some(value)) = (entry.get(0).as_string(), entry.get(1).as_string()) {
						response_headers.push((name, value));
					}
				}
			}
			Ok(None) => warn!("Response headers are not iterable."),
			Err(error) => warn!("Failed to iterate response headers: {:?}", error),
		}

		Ok(NavigationResponse {
			status: response.status(),
			status_text: response.status_text(),
			url: response.url(),
			redirected: response.redirected(),
			headers: response_headers,
			body: response.body().map(read_body),
		})
	}

	fn current_href(&self) -> String {
		self.window.location().href().unwrap_or_else(|error| {
			error!("Failed to read the location: {:?}", error);
			String::new()
		})
	}

	fn base_uri(&self) -> String {
		match self.document.base_uri() {
			Ok(Some(base_uri)) => base_uri,
			Ok(None) => self.current_href(),
			Err(error) => {
				error!("Failed to read the base URI: {:?}", error);
				self.current_href()
			}
		}
	}

	fn push_history_entry(&self, href: &str) {
		if let Some(history) = self.history() {
			if let Err(error) = history.push_state_with_url(&JsValue::NULL, "", Some(href)) {
				error!("Failed to push history entry: {:?}", error);
			}
		}
	}

	fn replace_history_entry(&self, href: &str) {
		if let Some(history) = self.history() {
			if let Err(error) = history.replace_state_with_url(&JsValue::NULL, "", Some(href)) {
				error!("Failed to replace history entry: {:?}", error);
			}
		}
	}

	fn navigate_full(&self, href: &str) {
		if let Err(error) = self.window.location().replace(href) {
			error!("Full navigation failed: {:?}", error);
		}
	}

	fn merge_document(&self, html: &str) {
		let parsed = web_sys::DomParser::new().and_then(|parser| parser.parse_from_string(html, web_sys::SupportedType::TextHtml));
		match parsed {
			Ok(parsed) => (self.merge)(&self.document, &parsed),
			Err(error) => error!("Failed to parse the navigation response: {:?}", error),
		}
	}

	fn show_error_document(&self, message: &str) {
		match self.document.document_element() {
			Some(root) => root.set_text_content(Some(message)),
			None => warn!("No document element to show the error in."),
		}
	}

	fn append_streaming_fragment(&self, markup: &str) {
		let template = match self.document.create_element("template").map(|element| element.dyn_into::<HtmlTemplateElement>()) {
			Ok(Ok(template)) => template,
			Ok(Err(element)) => {
				error!("Expected `HtmlTemplateElement` but found {:?}.", element);
				return;
			}
			Err(error) => {
				error!("Failed to create a template element: {:?}", error);
				return;
			}
		};
		template.set_inner_html(markup);
		let parent: web_sys::Node = match self.document.body() {
			Some(body) => body.into(),
			None => match self.document.document_element() {
				Some(root) => root.into(),
				None => {
					warn!("Nowhere to append the streaming update to.");
					return;
				}
			},
		};
		if let Err(error) = parent.append_child(&template.content()) {
			error!("Failed to append streaming update: {:?}", error);
		}
	}

	fn scroll_to_fragment(&self, fragment: &str) -> bool {
		let id = js_sys::decode_uri_component(fragment).ok().and_then(|id| id.as_string()).unwrap_or_else(|| fragment.to_owned());
		match self.document.get_element_by_id(&id) {
			Some(element) => {
				element.scroll_into_view();
				true
			}
			None => false,
		}
	}

	fn document_updated(&self) {
		(self.document_updated)();
	}
}

fn read_body(stream: ReadableStream) -> LocalBoxStream<'static, Result<Vec<u8>, NetworkError>> {
	let reader: ReadableStreamDefaultReader = stream.get_reader().unchecked_into();
	futures_util::stream::unfold(Some(reader), |reader| async move {
		let reader = reader?;
		match JsFuture::from(reader.read()).await {
			Err(error) => Some((Err(NetworkError::Body(describe(&error))), None)),
			Ok(result) => {
				let done = Reflect::get(&result, &JsValue::from_str("done")).ok().and_then(|done| done.as_bool()).unwrap_or(true);
				if done {
					return None;
				}
				let value = Reflect::get(&result, &JsValue::from_str("value")).unwrap_or(JsValue::UNDEFINED);
				Some((Ok(Uint8Array::new(&value).to_vec()), Some(reader)))
			}
		}
	})
	.boxed_local()
}

/// Builds the link interception input from a click event.
#[must_use]
pub fn anchor_click_from_event(event: &web_sys::MouseEvent) -> AnchorClick {
	let path = event
		.composed_path()
		.iter()
		.map(|target| match target.dyn_ref::<web_sys::HtmlAnchorElement>() {
			Some(anchor) => PathEntry::Anchor(Anchor {
				href: anchor.has_attribute("href").then(|| anchor.href()),
				target: anchor.get_attribute("target"),
				download: anchor.has_attribute("download"),
			}),
			None => match target.dyn_ref::<web_sys::Element>() {
				// SVG anchors don't resolve their `href` on their own.
				Some(element) if element.local_name() == "a" => PathEntry::Anchor(Anchor {
					href: element.get_attribute("href").map(|href| resolve_against_base(element, &href)),
					target: element.get_attribute("target"),
					download: element.has_attribute("download"),
				}),
				_ => PathEntry::Other,
			},
		})
		.collect();

	AnchorClick {
		button: event.button(),
		modifiers: Modifiers {
			ctrl: event.ctrl_key(),
			shift: event.shift_key(),
			alt: event.alt_key(),
			meta: event.meta_key(),
		},
		default_prevented: event.default_prevented(),
		path,
	}
}

fn resolve_against_base(element: &web_sys::Element, href: &str) -> String {
	let base = element.base_uri().ok().flatten().unwrap_or_default();
	match web_sys::Url::new_with_base(href, &base) {
		Ok(url) => url.href(),
		Err(error) => {
			trace!("Could not resolve {:?}: {:?}", href, error);
			href.to_owned()
		}
	}
}

/// Runs `callback` once after `delay`, e.g. to implement
/// [`BackendHost::arm_client_startup_timer`](`crate::reconcile::BackendHost::arm_client_startup_timer`).
///
/// # Errors
///
/// Iff there is no window or the timer couldn't be set.
pub fn set_timeout(delay: Duration, callback: impl FnOnce() + 'static) -> Result<i32, JsValue> {
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
	let callback = Closure::once_into_js(callback);
	let delay = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
	window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
}

/// Runs `callback` on the microtask queue, to coalesce bursts of refresh requests
/// (see [`RootComponentManager::request_refresh`](`crate::reconcile::RootComponentManager::request_refresh`)).
pub fn defer(callback: impl FnOnce() + 'static) {
	wasm_bindgen_futures::spawn_local(async move { callback() });
}
