//! pybundle-lib: build orchestration for redistributable Python runtimes.
//!
//! The crate is organised around three tiers:
//! - `Recipe`: an ordered workspace of projects, driving the lifecycle verbs
//! - `Project`: an ordered group of builders plus the projects it depends on
//! - `Builder`: the reset → download → pre_process → build → post_process lifecycle of one product
//!
//! Compiled runtimes are made relocatable by the [`relocate`] engine, which rewrites embedded
//! library load paths for the package or extension deployment context.

pub mod build;
pub mod consts;
pub mod dag;
pub mod error;
pub mod execute;
pub mod platform;
pub mod project;
pub mod recipe;
pub mod relocate;
pub mod settings;
pub mod util;

pub use build::{Builder, BuilderSpec, Step, Variant, Verb};
pub use error::{ConfigError, Error, Result, StepError};
pub use execute::Env;
pub use project::{Project, ProjectSpec};
pub use recipe::{Recipe, RecipeSpec};
pub use settings::Settings;
