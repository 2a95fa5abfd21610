//! gital GitLab - group inventory for gital
//!
//! This crate lists the projects of a GitLab group so the orchestrator knows
//! what to clone.

mod client;
mod error;

pub use client::{GitLabClient, GitLabProject};
pub use error::{Error, Result};
