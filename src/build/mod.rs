//! Build execution: prompt composition, upstream call, extraction and storage.

pub mod artifacts;
pub mod executor;
pub mod prompt;
pub mod strip;

pub use artifacts::{ArtifactPath, ArtifactStore, BUILDS_ROUTE, FsArtifactStore, new_build_id};
pub use executor::{BuildExecutor, StoredArtifact};
pub use prompt::{Platform, compose_prompt};
pub use strip::strip_code_fences;
