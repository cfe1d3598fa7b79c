use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use parking_lot::RwLock;
use serde_json::Value;

use super::{Driver, DriverInner};
use crate::automation::Automation;
use crate::capabilities::{Constraint, Constraints};
use crate::commands::CommandTable;
use crate::error::Result;
use crate::history::HistoryLog;
use crate::logs::{LogType, LogTypes};
use crate::negotiator::DialectNegotiator;
use crate::options::DriverOptions;
use crate::security::SecurityPolicy;
use crate::settings::DeviceSettings;
use crate::shutdown::ShutdownSignal;
use crate::timeouts::TimeoutController;

/// Assembles a [`Driver`].
///
/// Starts from the base command set and the base capability schema. Both can
/// only grow: re-registering a command or redefining a constraint is an error
/// unless done through the explicit override.
pub struct DriverBuilder {
	automation: Arc<dyn Automation>,
	opts: DriverOptions,
	constraints: Constraints,
	commands: CommandTable,
	locator_strategies: Vec<String>,
	web_locator_strategies: Vec<String>,
	insecure_features: Vec<String>,
	settings: DeviceSettings,
	log_types: LogTypes,
}

impl DriverBuilder {
	pub fn new<A: Automation>(automation: A) -> Self {
		Self {
			automation: Arc::new(automation),
			opts: DriverOptions::default(),
			constraints: Constraints::base(),
			commands: CommandTable::base(),
			locator_strategies: Vec::new(),
			web_locator_strategies: Vec::new(),
			insecure_features: Vec::new(),
			settings: DeviceSettings::default(),
			log_types: LogTypes::new(),
		}
	}

	pub fn options(mut self, opts: DriverOptions) -> Self {
		self.opts = opts;
		self
	}

	/// Merges extra capability constraints into the schema.
	pub fn constraints(mut self, extra: Constraints) -> Result<Self> {
		self.constraints.merge(extra)?;
		Ok(self)
	}

	pub fn constraint(mut self, name: impl Into<String>, rule: Constraint) -> Result<Self> {
		self.constraints.insert(name, rule)?;
		Ok(self)
	}

	/// Adds a driver-specific command.
	pub fn command<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Result<Self>
	where
		F: Fn(Driver, Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		self.commands.register(name, handler)?;
		Ok(self)
	}

	/// Replaces a command, base commands included.
	pub fn override_command<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
	where
		F: Fn(Driver, Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		self.commands.override_command(name, handler);
		self
	}

	pub fn locator_strategies<I, S>(mut self, strategies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.locator_strategies.extend(strategies.into_iter().map(Into::into));
		self
	}

	/// Strategies accepted only in a web context.
	pub fn web_locator_strategies<I, S>(mut self, strategies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.web_locator_strategies.extend(strategies.into_iter().map(Into::into));
		self
	}

	/// Declares the insecure features this driver knows about.
	pub fn insecure_features<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.insecure_features.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn settings(mut self, settings: DeviceSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn log_type(mut self, name: impl Into<String>, log_type: LogType) -> Self {
		self.log_types.insert(name, log_type);
		self
	}

	pub fn build(self) -> Driver {
		let opts = self.opts;
		let security = SecurityPolicy::new(self.insecure_features)
			.relaxed(opts.relaxed_security)
			.allow(opts.allow_insecure.iter().cloned())
			.deny(opts.deny_insecure.iter().cloned());
		let timeouts = TimeoutController::new(opts.idle_timeout_ms, opts.implicit_wait_ms);

		Driver {
			inner: Arc::new(DriverInner {
				automation: self.automation,
				commands: self.commands,
				opts: RwLock::new(opts),
				constraints: self.constraints,
				locator_strategies: self.locator_strategies,
				web_locator_strategies: self.web_locator_strategies,
				security,
				session: RwLock::new(None),
				original_caps: RwLock::new(None),
				negotiator: DialectNegotiator::new(),
				timeouts,
				shutdown: ShutdownSignal::new(),
				queue: tokio::sync::Mutex::new(()),
				in_flight: AtomicUsize::new(0),
				history: HistoryLog::new(),
				settings: self.settings,
				log_types: self.log_types,
			}),
		}
	}
}
