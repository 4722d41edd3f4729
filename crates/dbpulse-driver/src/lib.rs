//! # dbpulse Driver Provisioner
//!
//! Resolves the native database driver artifact for the host CPU
//! architecture and verifies it is installed before the process accepts
//! traffic.
//!
//! The architecture-to-artifact mapping is a static table rather than
//! conditional branching scattered across call sites, so the
//! unsupported-architecture behavior lives in exactly one place. An
//! architecture absent from the table is surfaced to the operator as
//! [`ProvisionError::UnsupportedArchitecture`] carrying the raw detected
//! string — never silently defaulted.
//!
//! Resolution is idempotent and side-effect free: calling [`resolve`] twice
//! in the same process yields identical profiles. Installation of the
//! OS-level artifact is the packaging collaborator's job; this crate only
//! verifies presence.

pub mod profile;

pub use dbpulse_core::error::ProvisionError;
pub use profile::{
    ArchitectureProfile, CanonicalArch, DriverArtifact, default_search_roots, resolve,
    resolve_for,
};
