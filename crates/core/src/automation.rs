//! The operations a concrete automation backend plugs into a [`Driver`].
//!
//! Every method has a default so a backend only overrides what it supports.
//! Async methods return boxed futures so the trait stays object-safe and can
//! live behind `Arc<dyn Automation>`.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};
use wd_protocol::Caps;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::proxy::AvoidRule;

/// Boxed future borrowed from the backend and the driver.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A locate-element request after argument parsing and strategy validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindRequest {
	pub strategy: String,
	pub selector: String,
	/// Return every match instead of the first.
	pub multiple: bool,
	/// Element to search under; `None` searches from the root.
	pub context: Option<String>,
}

pub trait Automation: Send + Sync + 'static {
	/// When false, commands run without the per-driver queue and never arm the idle timer.
	fn commands_queue_enabled(&self) -> bool {
		true
	}

	fn is_web_context(&self) -> bool {
		false
	}

	fn find_el_or_els<'a>(&'a self, _driver: &'a Driver, _request: &'a FindRequest) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async { Err(Error::NotYetImplemented) })
	}

	fn page_source<'a>(&'a self, _driver: &'a Driver) -> BoxFuture<'a, Result<String>> {
		Box::pin(async { Err(Error::NotYetImplemented) })
	}

	/// Runs after capabilities are accepted and before the session id is assigned.
	fn on_create_session<'a>(&'a self, _driver: &'a Driver, _caps: &'a Caps) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	/// Runs before the session is cleared. The session is cleared even if this fails.
	fn on_delete_session<'a>(&'a self, _driver: &'a Driver) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	/// Routes that must not be forwarded to a remote endpoint.
	fn proxy_avoid_list(&self, _session_id: Option<&str>) -> Result<Vec<AvoidRule>> {
		Ok(Vec::new())
	}

	fn proxy_active(&self, _session_id: Option<&str>) -> bool {
		false
	}

	fn can_proxy(&self, _session_id: Option<&str>) -> bool {
		false
	}

	/// Backend data reported alongside the session in `getSessions`.
	fn driver_data(&self) -> Value {
		json!({})
	}

	fn status<'a>(&'a self) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async { Ok(json!({})) })
	}
}

/// Backend with every default. Sessions can be created and deleted, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAutomation;

impl Automation for NullAutomation {}
