//! Move 合约包构建与发布。

pub mod artifact;
pub mod process;
pub mod publisher;
pub mod types;

pub use artifact::PublishArtifact;
pub use process::ToolchainSettings;
pub use publisher::PackagePublisher;
pub use types::{PublishOutcome, PublishStage, PublishTracker};
