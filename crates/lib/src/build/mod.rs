//! Builders and their lifecycle.
//!
//! A builder produces one product (python, openssl or bzip2) in one variant. Variants are plain
//! data ([`Variant`]); every variant runs through the same [`Builder`] lifecycle, which consults
//! the variant to pick its layout, provisioning and post-build fixups.
//!
//! # Submodules
//!
//! - [`catalog`] - named presets and the [`BuilderSpec`] they produce
//! - [`layout`] - derived paths of a builder
//! - [`strip`] - trimming and zipping an installed runtime

mod builder;
pub mod catalog;
pub mod layout;
pub mod strip;
mod types;

pub use builder::Builder;
pub use catalog::{BuilderSpec, PRESETS};
pub use layout::Layout;
pub use types::*;
