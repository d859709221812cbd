//! Read-only, process-wide information.
//!
//! [`ProcessInfo`] is built once at startup and handed to every component that needs it behind an
//! `Arc`. Nothing in it changes after construction.

use std::collections::BTreeSet;
use std::time::SystemTime;

use bytesize::ByteSize;
use serde::Serialize;
use sysinfo::System;

/// The server version reported by the management API and the `Server` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A named feature flag reported on `/info`.
///
/// Flags are informational: they describe the build to clients and operators, and enabling one
/// adds no endpoints to the object API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    /// Marks the build as multipart-aware. The object API itself accepts each upload as a single
    /// streamed body.
    MultipartPutObject,
}

/// The set of features enabled for this process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeSet<Feature>);

impl FeatureFlags {
    /// Returns the flags with `feature` enabled.
    #[must_use]
    pub fn with(mut self, feature: Feature) -> Self {
        self.0.insert(feature);
        self
    }

    /// Returns `true` if `feature` is enabled.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }
}

/// Host and runtime details, collected only in debug mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    /// Host name, operating system and architecture.
    pub platform: String,
    /// Server version and available parallelism.
    pub runtime: String,
    /// Memory of the host and of this process.
    pub memory: String,
}

impl SystemInfo {
    /// Collects information about the current host.
    pub fn collect() -> Self {
        let host = gethostname::gethostname().to_string_lossy().into_owned();

        Self {
            platform: format!(
                "Host: {host} | OS: {} | Arch: {}",
                std::env::consts::OS,
                std::env::consts::ARCH,
            ),
            runtime: format!("Version: {VERSION} | CPUs: {}", num_cpus::get()),
            memory: memory_summary(),
        }
    }
}

fn memory_summary() -> String {
    let mut system = System::new();
    system.refresh_memory();

    // Resident memory of this process, if the platform reports it.
    let process = sysinfo::get_current_pid().ok().and_then(|pid| {
        system.refresh_process(pid);
        system.process(pid).map(|process| process.memory())
    });

    let process = process.map_or_else(|| "unknown".to_owned(), |bytes| ByteSize(bytes).to_string());
    format!(
        "Process: {process} | Used: {} | Total: {}",
        ByteSize(system.used_memory()),
        ByteSize(system.total_memory()),
    )
}

/// Immutable information shared by all listeners.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    /// The server version.
    pub version: &'static str,
    /// Start time of the process, formatted as RFC 3339.
    pub started_at: String,
    /// Enabled features.
    pub features: FeatureFlags,
    /// Whether debug mode is on.
    pub debug: bool,
    /// Host details, present in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemInfo>,
}

impl ProcessInfo {
    /// Captures process information with the default feature set.
    pub fn new(debug: bool) -> Self {
        Self {
            version: VERSION,
            started_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            features: FeatureFlags::default().with(Feature::MultipartPutObject),
            debug,
            system: debug.then(SystemInfo::collect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_system_info_only_in_debug_mode() {
        assert!(ProcessInfo::new(false).system.is_none());
        assert!(ProcessInfo::new(true).system.is_some());
    }

    #[test]
    fn reports_host_and_memory() {
        let system = SystemInfo::collect();
        assert!(system.platform.starts_with("Host: "), "{}", system.platform);
        assert!(system.platform.contains(std::env::consts::OS));
        assert!(system.memory.contains("Total: "), "{}", system.memory);
    }

    #[test]
    fn enables_default_features() {
        let info = ProcessInfo::new(false);
        assert!(info.features.is_enabled(Feature::MultipartPutObject));

        let json = serde_json::to_value(&info.features).unwrap();
        assert_eq!(json, serde_json::json!(["multipart-put-object"]));
    }
}
