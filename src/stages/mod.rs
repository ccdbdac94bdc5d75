//! Pipeline stages.
//!
//! Each stage is a free async function (or, for dependencies, a resolver)
//! that takes the [`Runner`](crate::runner::Runner) and the configuration it
//! needs and returns a typed result. Sequencing lives in
//! [`Pipeline`](crate::pipeline::Pipeline).

mod archive;
mod build;
mod bundle;
pub mod dependencies;
mod install;
mod smoke;

pub use archive::{ArchiveArtifact, archive_name, create_archive};
pub use build::run_build;
pub use bundle::{AppBundle, create_bundle};
pub use dependencies::{
    Checksum, DependencyResolver, Fetch, HttpFetcher, ResolutionStatus, ResolvedDependency,
};
pub use install::{InstalledBinary, install_binary};
pub use smoke::smoke_test;
