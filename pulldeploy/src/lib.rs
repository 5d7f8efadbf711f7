//! PullDeploy: a pull-based release-distribution system for
//! single-artifact applications.
//!
//! See [`repo`] for the repository index, [`deploy`] for the local
//! on-disk deployment manager, [`signaller`] for the change-notification
//! layer, and [`reconciler`] for the per-host agent loop that ties them
//! together.

pub mod cli;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod reconciler;
pub mod repo;
pub mod result;
pub mod signaller;
pub mod storage;

pub use errors::{PullDeployError, PullDeployResult};
