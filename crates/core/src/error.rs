//! Error types for the session engine.

use thiserror::Error;
use wd_protocol::{CapabilityShapeError, ErrorKind};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by command execution and driver configuration.
///
/// `Clone` so a single shutdown cause can be delivered to every listener.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	/// No handler is registered for the command.
	#[error("Method has not yet been implemented")]
	NotYetImplemented,

	/// The handler exists but does not support this operation.
	#[error("Method is not implemented: {0}")]
	NotImplemented(String),

	/// The driver is shutting down or has no live session.
	#[error("{0}")]
	NoSuchDriver(String),

	/// Unsupported locator strategy.
	#[error("{0}")]
	InvalidSelector(String),

	/// Capability validation or session setup failed.
	#[error("A new session could not be created. Details: {0}")]
	SessionNotCreated(String),

	/// Malformed command argument.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// A condition wait expired.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// No command arrived within the idle timeout.
	#[error(
		"Idle timeout of {} seconds expired. Try customizing the timeout using the 'newCommandTimeout' capability",
		*timeout_ms as f64 / 1000.0
	)]
	IdleTimeout { timeout_ms: u64 },

	/// Element lookup found nothing.
	#[error("An element could not be located on the page using the given search parameters: {0}")]
	NoSuchElement(String),

	/// An insecure feature was used without being enabled.
	#[error(
		"Potentially insecure feature '{0}' has not been enabled. Enable it with --allow-insecure or --relaxed-security"
	)]
	FeatureDisabled(String),

	/// Programmer error: reserved names, malformed rules, undeclared features.
	#[error("{0}")]
	Misuse(String),

	/// Catch-all for handler failures with no better kind.
	#[error("{0}")]
	Unknown(String),
}

impl Error {
	/// Default cause broadcast when the driver shuts down unexpectedly.
	pub fn unexpected_shutdown() -> Self {
		Error::NoSuchDriver("The driver was unexpectedly shut down!".to_string())
	}

	/// Error returned for session-bound commands when no session is live.
	pub fn no_session() -> Self {
		Error::NoSuchDriver("A session is either terminated or not started".to_string())
	}

	/// Maps to the wire-level error kind.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::NotYetImplemented => ErrorKind::NotYetImplemented,
			Error::NotImplemented(_) => ErrorKind::NotImplemented,
			Error::NoSuchDriver(_) | Error::IdleTimeout { .. } => ErrorKind::NoSuchDriver,
			Error::InvalidSelector(_) => ErrorKind::InvalidSelector,
			Error::SessionNotCreated(_) => ErrorKind::SessionNotCreated,
			Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
			Error::Timeout(_) => ErrorKind::Timeout,
			Error::NoSuchElement(_) => ErrorKind::NoSuchElement,
			Error::FeatureDisabled(_) | Error::Misuse(_) | Error::Unknown(_) => ErrorKind::Unknown,
		}
	}

	/// Returns true if this error means the session is gone.
	pub fn is_no_such_driver(&self) -> bool {
		self.kind() == ErrorKind::NoSuchDriver
	}
}

impl From<CapabilityShapeError> for Error {
	fn from(err: CapabilityShapeError) -> Self {
		Error::InvalidArgument(err.to_string())
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::InvalidArgument(err.to_string())
	}
}
