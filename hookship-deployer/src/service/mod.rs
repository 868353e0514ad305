//! Service layer
//!
//! Each pipeline stage talks to one external capability through a service
//! trait: source fetches, version resolution, image building/publishing and
//! the update authority. The orchestrator only sees the traits, so tests
//! inject recording fakes.

mod image;
mod source;
mod update;
mod version;

// Re-export traits
pub use image::ImageBuilder;
pub use source::SourceService;
pub use update::UpdateService;
pub use version::VersionResolver;

// Re-export implementations
pub use image::DockerImageBuilder;
pub use source::GitSourceService;
pub use version::GitVersionResolver;
