//! Runtime configuration, typically read from a JSON blob embedded in the page.

use core::time::Duration;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
	pub reconciler: ReconcilerOptions,
	pub navigation: NavigationOptions,
}

impl Options {
	/// Missing fields take their defaults.
	///
	/// # Errors
	///
	/// Iff `json` isn't a valid options object.
	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcilerOptions {
	/// How long `auto` components wait for the client runtime before settling for the server.
	pub client_startup_timeout_ms: u64,
}

impl Default for ReconcilerOptions {
	fn default() -> Self {
		Self { client_startup_timeout_ms: 100 }
	}
}

impl ReconcilerOptions {
	#[must_use]
	pub fn client_startup_timeout(&self) -> Duration {
		Duration::from_millis(self.client_startup_timeout_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigationOptions {
	/// Whether link clicks and history traversal are handled by streamed navigation at all.
	pub enhanced_navigation: bool,
	pub request_header_name: String,
	/// Asks the server to frame its response.
	pub request_header_value: String,
	/// Response header carrying the frame boundary token.
	pub framing_header_name: String,
	/// Response header carrying an external URL to navigate to instead.
	pub redirect_header_name: String,
}

impl Default for NavigationOptions {
	fn default() -> Self {
		Self {
			enhanced_navigation: true,
			request_header_name: "accept".to_owned(),
			request_header_value: "text/html; framework-enhanced-nav=on".to_owned(),
			framing_header_name: "ssr-framing".to_owned(),
			redirect_header_name: "framework-enhanced-nav-redirect-location".to_owned(),
		}
	}
}
