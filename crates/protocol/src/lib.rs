//! Wire shapes shared by the WebDriver session engine.
//!
//! Nothing in this crate touches a runtime. It classifies session-creation
//! payloads, unpacks W3C capability containers, and names the error kinds the
//! engine reports so an external router can map them to wire responses.
//!
//! # Main Types
//!
//! - [`Dialect`] - JSONWP vs W3C wire dialect, see [`determine_dialect`]
//! - [`W3cCapabilities`] - `alwaysMatch` / `firstMatch` container
//! - [`ErrorKind`] - error taxonomy with W3C code and status lookups

pub mod capabilities;
pub mod dialect;
pub mod error_kind;

pub use capabilities::{CapabilityShapeError, Caps, W3cCapabilities, strip_vendor_prefix};
pub use dialect::{Dialect, determine_dialect, is_w3c_capabilities};
pub use error_kind::ErrorKind;
