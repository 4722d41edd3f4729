//! Architecture profiles and the static driver mapping table.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use dbpulse_core::error::ProvisionError;

/// Canonical CPU architecture names used by driver packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalArch {
    Amd64,
    Arm64,
}

impl CanonicalArch {
    /// Get the canonical name as a string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CanonicalArch::Amd64 => "amd64",
            CanonicalArch::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for CanonicalArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A native driver artifact expected on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DriverArtifact {
    /// OS package providing the driver.
    pub package: &'static str,
    /// Major driver version the package pins.
    pub version: &'static str,
    /// Shared-library filename prefix to look for during verification.
    pub library_prefix: &'static str,
}

/// Raw architecture string to canonical name. Exhaustive: anything absent
/// here is an unsupported architecture, never a fallback.
const ARCH_TABLE: &[(&str, CanonicalArch)] = &[
    ("x86_64", CanonicalArch::Amd64),
    ("amd64", CanonicalArch::Amd64),
    ("aarch64", CanonicalArch::Arm64),
    ("arm64", CanonicalArch::Arm64),
];

struct DriverEntry {
    driver: &'static str,
    /// Artifacts per architecture. Empty for pure-client drivers that ship
    /// no native library.
    artifacts: &'static [(CanonicalArch, DriverArtifact)],
}

const MSODBCSQL18: DriverArtifact = DriverArtifact {
    package: "msodbcsql18",
    version: "18",
    library_prefix: "libmsodbcsql-18",
};

const MSODBCSQL17: DriverArtifact = DriverArtifact {
    package: "msodbcsql17",
    version: "17",
    library_prefix: "libmsodbcsql-17",
};

const DRIVER_TABLE: &[DriverEntry] = &[
    DriverEntry {
        driver: "ODBC Driver 18 for SQL Server",
        artifacts: &[
            (CanonicalArch::Amd64, MSODBCSQL18),
            (CanonicalArch::Arm64, MSODBCSQL18),
        ],
    },
    DriverEntry {
        driver: "ODBC Driver 17 for SQL Server",
        artifacts: &[
            (CanonicalArch::Amd64, MSODBCSQL17),
            (CanonicalArch::Arm64, MSODBCSQL17),
        ],
    },
    // Pure-Rust client, no native artifact to provision.
    DriverEntry {
        driver: "postgres",
        artifacts: &[],
    },
];

/// The resolved driver profile for this host.
///
/// Computed once at startup; immutable and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArchitectureProfile {
    /// Canonical architecture name.
    pub architecture: CanonicalArch,
    /// Expected native artifact, `None` for pure-client drivers.
    pub artifact: Option<DriverArtifact>,
}

impl ArchitectureProfile {
    /// Operator-facing identifier, e.g. `msodbcsql18:amd64`.
    pub fn artifact_id(&self) -> String {
        match self.artifact {
            Some(artifact) => format!("{}:{}", artifact.package, self.architecture),
            None => format!("none:{}", self.architecture),
        }
    }

    /// Verify the resolved artifact is installed under the given search
    /// roots.
    ///
    /// Presence means a shared library matching the artifact's filename
    /// prefix exists in one of the roots. Fatal to startup when it fails:
    /// the process must not accept traffic without a working driver.
    pub fn verify(&self, search_roots: &[PathBuf]) -> Result<(), ProvisionError> {
        let Some(artifact) = self.artifact else {
            debug!(architecture = %self.architecture, "driver is a pure client, nothing to verify");
            return Ok(());
        };

        for root in search_roots {
            if library_present(root, artifact.library_prefix) {
                info!(
                    artifact = artifact.package,
                    architecture = %self.architecture,
                    root = %root.display(),
                    "database driver artifact verified"
                );
                return Ok(());
            }
        }

        Err(ProvisionError::DriverMissing {
            artifact: artifact.package.to_string(),
            architecture: self.architecture.to_string(),
            reason: format!(
                "no shared library matching '{}*' under {} search root(s)",
                artifact.library_prefix,
                search_roots.len()
            ),
        })
    }

    /// Verify against the default search roots.
    pub fn verify_installed(&self) -> Result<(), ProvisionError> {
        self.verify(&default_search_roots())
    }
}

fn library_present(root: &Path, prefix: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(root) else {
        return false;
    };

    entries
        .flatten()
        .any(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
}

/// Default locations where driver packages install their shared libraries.
pub fn default_search_roots() -> Vec<PathBuf> {
    [
        "/opt/microsoft/msodbcsql18/lib64",
        "/opt/microsoft/msodbcsql17/lib64",
        "/usr/lib/x86_64-linux-gnu/odbc",
        "/usr/lib/aarch64-linux-gnu/odbc",
        "/usr/lib64",
        "/usr/local/lib",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// Resolve the driver profile for the host CPU architecture.
pub fn resolve(driver: &str) -> Result<ArchitectureProfile, ProvisionError> {
    resolve_for(driver, std::env::consts::ARCH)
}

/// Resolve the driver profile for an explicit raw architecture string.
///
/// Idempotent: the same inputs always yield the same profile.
pub fn resolve_for(driver: &str, raw_arch: &str) -> Result<ArchitectureProfile, ProvisionError> {
    let architecture = ARCH_TABLE
        .iter()
        .find(|(raw, _)| *raw == raw_arch)
        .map(|(_, canonical)| *canonical)
        .ok_or_else(|| ProvisionError::UnsupportedArchitecture {
            detected: raw_arch.to_string(),
        })?;

    let entry = DRIVER_TABLE
        .iter()
        .find(|entry| entry.driver == driver)
        .ok_or_else(|| ProvisionError::DriverMissing {
            artifact: driver.to_string(),
            architecture: architecture.to_string(),
            reason: "no driver artifact is registered under this name".to_string(),
        })?;

    let artifact = if entry.artifacts.is_empty() {
        None
    } else {
        Some(
            entry
                .artifacts
                .iter()
                .find(|(arch, _)| *arch == architecture)
                .map(|(_, artifact)| *artifact)
                .ok_or_else(|| ProvisionError::UnsupportedArchitecture {
                    detected: raw_arch.to_string(),
                })?,
        )
    };

    let profile = ArchitectureProfile {
        architecture,
        artifact,
    };
    info!(
        driver,
        raw_arch,
        artifact = %profile.artifact_id(),
        "database driver resolved"
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRIVER_18: &str = "ODBC Driver 18 for SQL Server";

    #[test]
    fn all_supported_architectures_resolve_exactly() {
        for (raw, expected) in [
            ("x86_64", CanonicalArch::Amd64),
            ("amd64", CanonicalArch::Amd64),
            ("aarch64", CanonicalArch::Arm64),
            ("arm64", CanonicalArch::Arm64),
        ] {
            let profile = resolve_for(DRIVER_18, raw).unwrap();
            assert_eq!(profile.architecture, expected, "raw arch {raw}");
            assert_eq!(profile.artifact.unwrap().package, "msodbcsql18");
        }
    }

    #[test]
    fn unknown_architecture_is_never_defaulted() {
        for raw in ["riscv64", "s390x", "mips64", ""] {
            match resolve_for(DRIVER_18, raw) {
                Err(ProvisionError::UnsupportedArchitecture { detected }) => {
                    assert_eq!(detected, raw)
                }
                other => panic!("expected UnsupportedArchitecture, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_driver_is_missing() {
        let err = resolve_for("Some Exotic Driver", "x86_64").unwrap_err();
        assert!(matches!(err, ProvisionError::DriverMissing { .. }));
    }

    #[test]
    fn resolve_is_idempotent() {
        let first = resolve_for(DRIVER_18, "aarch64").unwrap();
        let second = resolve_for(DRIVER_18, "aarch64").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.artifact_id(), "msodbcsql18:arm64");
    }

    #[test]
    fn pure_client_driver_has_no_artifact() {
        let profile = resolve_for("postgres", "x86_64").unwrap();
        assert!(profile.artifact.is_none());
        assert_eq!(profile.artifact_id(), "none:amd64");
        // Nothing on disk to check.
        assert!(profile.verify(&[]).is_ok());
    }

    #[test]
    fn verify_finds_library_under_search_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libmsodbcsql-18.so.3.1"), b"").unwrap();

        let profile = resolve_for(DRIVER_18, "x86_64").unwrap();
        profile.verify(&[dir.path().to_path_buf()]).unwrap();
    }

    #[test]
    fn verify_reports_missing_driver() {
        let dir = tempfile::tempdir().unwrap();

        let profile = resolve_for(DRIVER_18, "x86_64").unwrap();
        match profile.verify(&[dir.path().to_path_buf()]) {
            Err(ProvisionError::DriverMissing {
                artifact,
                architecture,
                ..
            }) => {
                assert_eq!(artifact, "msodbcsql18");
                assert_eq!(architecture, "amd64");
            }
            other => panic!("expected DriverMissing, got {other:?}"),
        }
    }
}
