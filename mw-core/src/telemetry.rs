//! Process-wide structured logging, set up once at startup.
//!
//! Modeled on the reference gateway's own telemetry module: a `tracing_subscriber`
//! registry with a reloadable `EnvFilter` layer, so the admin surface can change
//! the level at runtime without restarting the process.

use std::str::FromStr;
use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, fmt, reload};

type FilteredLayer = filter::Filtered<Box<dyn Layer<Registry> + Send + Sync>, EnvFilter, Registry>;
type LogHandle = reload::Handle<FilteredLayer, Registry>;

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid log filter: {0}")]
	InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
	#[error("reload failed: {0}")]
	Reload(#[from] reload::Error),
	#[error("logging is not initialized")]
	Uninitialized,
}

/// Installs the global subscriber. Must be called exactly once, as early as possible.
/// `json` selects structured output suitable for log aggregation; otherwise a
/// human-readable line format is used.
pub fn init(default_filter: &str, json: bool) {
	use tracing_subscriber::layer::SubscriberExt;
	use tracing_subscriber::util::SubscriberInitExt;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
	let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
		Box::new(fmt::layer().json())
	} else {
		Box::new(fmt::layer())
	};
	let (layer, handle) = reload::Layer::new(fmt_layer.with_filter(filter));
	let _ = LOG_HANDLE.set(handle);
	tracing_subscriber::registry().with(layer).init();
}

/// Returns the currently active filter directive string.
pub fn current_level() -> Result<String, Error> {
	let handle = LOG_HANDLE.get().ok_or(Error::Uninitialized)?;
	Ok(handle.with_current(|f| f.filter().to_string())?)
}

/// Replaces the active filter directive. Used by the admin `/logging` endpoint.
pub fn set_level(directive: &str) -> Result<(), Error> {
	let handle = LOG_HANDLE.get().ok_or(Error::Uninitialized)?;
	let new_filter = EnvFilter::from_str(directive)?;
	handle.modify(|layer| {
		*layer.filter_mut() = new_filter;
	})?;
	Ok(())
}
