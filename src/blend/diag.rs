use std::sync::Mutex;

/// Severity of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
	/// Fine-grained progress detail.
	Debug,
	/// Noteworthy but expected condition (missing member, cast).
	Info,
	/// Degraded result (misaligned struct, truncated chunk).
	Warning,
	/// Condition that aborts the current parse.
	Error,
}

impl Severity {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Debug => "debug",
			Self::Info => "info",
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

/// Sink for schema-drift and parse diagnostics.
///
/// Passed explicitly into the catalog compiler, matcher, and relinker.
pub trait Diagnostics: Send + Sync {
	/// Record one message.
	fn report(&self, severity: Severity, message: &str);
}

/// Forward every report to `tracing` events under the `blendlink` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
	fn report(&self, severity: Severity, message: &str) {
		match severity {
			Severity::Debug => tracing::debug!(target: "blendlink", "{message}"),
			Severity::Info => tracing::info!(target: "blendlink", "{message}"),
			Severity::Warning => tracing::warn!(target: "blendlink", "{message}"),
			Severity::Error => tracing::error!(target: "blendlink", "{message}"),
		}
	}
}

/// Drop every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Diagnostics for Silent {
	fn report(&self, _severity: Severity, _message: &str) {}
}

/// Print reports at or above a threshold to stderr.
#[derive(Debug, Clone, Copy)]
pub struct Stderr {
	/// Lowest severity printed.
	pub min: Severity,
}

impl Diagnostics for Stderr {
	fn report(&self, severity: Severity, message: &str) {
		if severity >= self.min {
			eprintln!("{}: {message}", severity.as_str());
		}
	}
}

/// Keep every report in memory.
#[derive(Debug, Default)]
pub struct Collect {
	entries: Mutex<Vec<(Severity, String)>>,
}

impl Collect {
	/// Snapshot of the recorded reports.
	pub fn entries(&self) -> Vec<(Severity, String)> {
		self.entries.lock().map(|items| items.clone()).unwrap_or_default()
	}

	/// Whether any report at `severity` contains `needle`.
	pub fn contains(&self, severity: Severity, needle: &str) -> bool {
		self.entries().iter().any(|(level, message)| *level == severity && message.contains(needle))
	}
}

impl Diagnostics for Collect {
	fn report(&self, severity: Severity, message: &str) {
		if let Ok(mut items) = self.entries.lock() {
			items.push((severity, message.to_owned()));
		}
	}
}

impl<T: Diagnostics + ?Sized> Diagnostics for std::sync::Arc<T> {
	fn report(&self, severity: Severity, message: &str) {
		(**self).report(severity, message);
	}
}
