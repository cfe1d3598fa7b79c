//! Error taxonomy reported by the session engine.
//!
//! The engine never encodes responses itself; an external router uses these
//! lookups to pick the wire representation for the active dialect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of failure surfaced by command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
	/// Command name has no handler.
	NotYetImplemented,
	/// Handler exists but the operation is unsupported.
	NotImplemented,
	/// Driver is shutting down or has no live session.
	NoSuchDriver,
	/// Unsupported locator strategy.
	InvalidSelector,
	/// Capability validation failed.
	SessionNotCreated,
	/// Malformed argument (e.g. timeout value).
	InvalidArgument,
	/// A wait expired.
	Timeout,
	/// Element lookup found nothing.
	NoSuchElement,
	/// Anything else, including programmer misuse.
	Unknown,
}

impl ErrorKind {
	/// W3C WebDriver error code string.
	pub fn w3c_code(&self) -> &'static str {
		match self {
			Self::NotYetImplemented => "unknown method",
			Self::NotImplemented => "unsupported operation",
			Self::NoSuchDriver => "invalid session id",
			Self::InvalidSelector => "invalid selector",
			Self::SessionNotCreated => "session not created",
			Self::InvalidArgument => "invalid argument",
			Self::Timeout => "timeout",
			Self::NoSuchElement => "no such element",
			Self::Unknown => "unknown error",
		}
	}

	/// HTTP status used with the W3C code.
	pub fn http_status(&self) -> u16 {
		match self {
			Self::NotYetImplemented | Self::NoSuchDriver | Self::NoSuchElement => 404,
			Self::InvalidSelector | Self::InvalidArgument => 400,
			Self::NotImplemented | Self::SessionNotCreated | Self::Timeout | Self::Unknown => 500,
		}
	}

	/// Numeric JSON Wire Protocol status.
	pub fn jsonwp_status(&self) -> u32 {
		match self {
			Self::NoSuchDriver => 6,
			Self::NoSuchElement => 7,
			Self::NotYetImplemented | Self::Unknown => 13,
			Self::Timeout => 21,
			Self::InvalidSelector => 32,
			Self::SessionNotCreated => 33,
			Self::InvalidArgument => 61,
			Self::NotImplemented => 405,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.w3c_code())
	}
}
