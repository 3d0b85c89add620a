#![doc(html_root_url = "https://docs.rs/progressive-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod cancel;
pub mod descriptor;
pub mod discover;
pub mod dom;
pub mod error;
pub mod framing;
pub mod marker;
pub mod memory;
pub mod navigation;
pub mod navigator;
pub mod operation;
pub mod options;
pub mod reconcile;
pub mod startup;
pub mod web;

pub use error::{ContractError, Error, NetworkError, ProtocolError};
