//! Subscriber setup for binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use voice_conf::LoggingSettings;

/// Filter for `RUST_LOG` if set, otherwise `directive`.
///
/// An unparsable directive falls back to `info`.
pub fn env_filter(directive: &str) -> EnvFilter {
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(directive))
		.unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Directive for a `-v` count: the configured filter, then debug, then trace.
pub fn directive_for(settings: &LoggingSettings, verbosity: u8) -> String {
	match verbosity {
		0 => settings.filter.clone(),
		1 => "debug".to_string(),
		_ => "trace".to_string(),
	}
}

/// Installs a formatting subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(settings: &LoggingSettings, verbosity: u8) -> Result<(), TryInitError> {
	let filter = env_filter(&directive_for(settings, verbosity));

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(false)
				.with_writer(std::io::stderr),
		)
		.try_init()
}
