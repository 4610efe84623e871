// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory sessions for Loom.
//!
//! [`Directory`] runs typed queries and persists staged edits through a
//! [`DirectoryClient`]; [`MembershipResolver`] answers group membership
//! questions with cycle-safe, cancellable traversals.
//!
//! ```no_run
//! use std::sync::Arc;
//! use loom_directory::{load_config, Directory, MemoryDirectory};
//! use loom_directory_core::User;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Directory::new(Arc::new(MemoryDirectory::new()), load_config()?);
//! let jdoe = directory
//! 	.find_by::<User, _, _>("find first by sAMAccountName", ["jdoe"])
//! 	.await?
//! 	.into_first();
//! assert!(jdoe.is_none());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod directory;
#[cfg(feature = "ldap")]
pub mod ldap;
pub mod membership;
pub mod memory;

pub use client::DirectoryClient;
pub use config::{
	load_bind_password, load_config, load_config_with_file, BindPassword, ConfigError,
	DirectoryConfig, DirectoryConfigLayer,
};
pub use directory::{Directory, Found};
#[cfg(feature = "ldap")]
pub use ldap::LdapClient;
pub use membership::{CancellationToken, MembershipResolver, TraversalBudget};
pub use memory::{CallCounts, MemoryDirectory};
