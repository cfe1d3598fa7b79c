use serde_json::Value;
use tracing::debug;

use super::str_arg;
use crate::automation::FindRequest;
use crate::driver::Driver;
use crate::error::Result;

pub(super) async fn find_element(driver: Driver, args: Vec<Value>) -> Result<Value> {
	find_with_processing(&driver, &args, false, false).await
}

pub(super) async fn find_elements(driver: Driver, args: Vec<Value>) -> Result<Value> {
	find_with_processing(&driver, &args, true, false).await
}

pub(super) async fn find_element_from_element(driver: Driver, args: Vec<Value>) -> Result<Value> {
	find_with_processing(&driver, &args, false, true).await
}

pub(super) async fn find_elements_from_element(driver: Driver, args: Vec<Value>) -> Result<Value> {
	find_with_processing(&driver, &args, true, true).await
}

/// Validates the strategy and delegates to the backend.
///
/// On failure, optionally logs the page source, then returns the backend's
/// error unchanged.
async fn find_with_processing(driver: &Driver, args: &[Value], multiple: bool, from_element: bool) -> Result<Value> {
	let strategy = str_arg(args, 0, "using")?;
	let selector = str_arg(args, 1, "value")?;
	let context = if from_element {
		Some(str_arg(args, 2, "elementId")?.to_string())
	} else {
		None
	};

	let automation = driver.automation();
	driver.validate_locator_strategy(strategy, automation.is_web_context())?;

	let request = FindRequest {
		strategy: strategy.to_string(),
		selector: selector.to_string(),
		multiple,
		context,
	};
	let err = match automation.find_el_or_els(driver, &request).await {
		Ok(found) => return Ok(found),
		Err(err) => err,
	};

	if driver.opts().print_page_source_on_find_failure {
		let plural = if multiple { "s" } else { "" };
		debug!(target = "wd", error = %err, "Error finding element{plural}");
		match automation.page_source(driver).await {
			Ok(source) => debug!(target = "wd", "Page source requested through 'printPageSourceOnFindFailure':\n{source}"),
			Err(source_err) => debug!(target = "wd", error = %source_err, "Could not capture page source"),
		}
	}
	Err(err)
}
