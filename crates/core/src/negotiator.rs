//! Per-driver record of the negotiated wire dialect.

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use wd_protocol::{Dialect, determine_dialect};

/// Holds the dialect of the current session, unset until the first session is requested.
#[derive(Debug, Default)]
pub struct DialectNegotiator {
	dialect: RwLock<Option<Dialect>>,
}

impl DialectNegotiator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Classifies session-creation arguments and records the result.
	pub fn negotiate(&self, args: &[Value]) -> Dialect {
		let dialect = determine_dialect(args);
		debug!(target = "wd", dialect = %dialect, "Negotiated protocol dialect");
		*self.dialect.write() = Some(dialect);
		dialect
	}

	pub fn dialect(&self) -> Option<Dialect> {
		*self.dialect.read()
	}

	pub fn is_jsonwp(&self) -> bool {
		self.dialect() == Some(Dialect::JsonWire)
	}

	pub fn is_w3c(&self) -> bool {
		self.dialect() == Some(Dialect::W3c)
	}

	pub fn set_jsonwp(&self) {
		*self.dialect.write() = Some(Dialect::JsonWire);
	}

	pub fn set_w3c(&self) {
		*self.dialect.write() = Some(Dialect::W3c);
	}
}
