//! wd: per-session WebDriver command execution engine
//!
//! A [`Driver`] accepts named commands against a single live session. It
//! serializes command execution, expires idle sessions, negotiates the wire
//! dialect at session creation, validates capabilities, and keeps managed
//! child drivers' timeouts in sync. Routing wire requests to command names
//! and encoding responses is left to the host.
//!
//! # Examples
//!
//! ## Driving a session
//!
//! ```ignore
//! use serde_json::json;
//! use wd::{Driver, NullAutomation};
//!
//! #[tokio::main]
//! async fn main() -> wd::Result<()> {
//!     let driver = Driver::builder(NullAutomation).build();
//!
//!     let created = driver
//!         .execute("createSession", vec![json!({"platformName": "Android"})])
//!         .await?;
//!     println!("session {}", created["sessionId"]);
//!
//!     driver.execute("deleteSession", vec![]).await?;
//!     println!("{} commands recorded", driver.event_history().commands.len());
//!     Ok(())
//! }
//! ```
//!
//! ## A backend with its own commands
//!
//! ```ignore
//! use wd::{Automation, Driver, DriverOptions};
//!
//! struct Echo;
//! impl Automation for Echo {}
//!
//! let driver = Driver::builder(Echo)
//!     .options(DriverOptions { idle_timeout_ms: 0, ..Default::default() })
//!     .locator_strategies(["id", "xpath"])
//!     .command("echo", |_driver, args| async move { Ok(args.into()) })?
//!     .build();
//! ```
//!
//! # Main Types
//!
//! - [`Driver`] - the dispatcher, see [`Driver::execute`]
//! - [`Automation`] - hooks a concrete backend implements
//! - [`TimeoutController`] - idle timer, implicit wait, managed-driver fan-out
//! - [`ShutdownSignal`] - unexpected-shutdown broadcast
//! - [`Constraints`] - capability schema and validation
//! - [`AvoidRule`] - proxy-avoidance rules, see [`should_avoid`]

pub mod automation;
pub mod capabilities;
pub mod commands;
pub mod driver;
pub mod error;
pub mod history;
pub mod logs;
pub mod managed;
pub mod negotiator;
pub mod options;
pub mod proxy;
pub mod security;
pub mod settings;
pub mod shutdown;
pub mod timeouts;

pub use automation::{Automation, BoxFuture, FindRequest, NullAutomation};
pub use capabilities::{Constraint, Constraints, Presence, ValidationReport, ValueType};
pub use commands::{CREATE_SESSION, CommandTable, DELETE_SESSION, EXECUTE_DRIVER_SCRIPT};
pub use driver::{Driver, DriverBuilder, Session};
pub use error::{Error, Result};
pub use history::{CommandRecord, EventHistory};
pub use logs::{LogType, LogTypes};
pub use managed::{ManagedDriver, ManagedDriverRegistry, TimeoutSettings};
pub use negotiator::DialectNegotiator;
pub use options::DriverOptions;
pub use proxy::{AvoidMethod, AvoidRule, should_avoid};
pub use security::SecurityPolicy;
pub use settings::{DeviceSettings, SettingsListener};
pub use shutdown::{ListenerGuard, ListenerId, ListenerKind, ShutdownSignal};
pub use timeouts::{TimeoutController, parse_timeout_argument, parse_timeout_value};
pub use wd_protocol::{Caps, Dialect, ErrorKind};
