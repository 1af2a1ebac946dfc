//! Local git repository synchronizer.
//!
//! This crate syncs working copies against their remotes by:
//! - Fetching from the remote
//! - Stashing uncommitted changes
//! - Selecting the current branch, one named branch or a branch list
//! - Linking or verifying upstream tracking and pulling
//! - Restoring the original branch and stash

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod git;
pub mod inspect;
pub mod log;
pub mod output;
pub mod repo;
pub mod result;
pub mod stash;
pub mod sync;
pub mod upstream;
