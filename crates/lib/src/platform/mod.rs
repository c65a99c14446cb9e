//! Workspace location and the fixed directory layout shared by every project.

pub mod paths;

pub use paths::{ProjectPaths, workspace_root};
