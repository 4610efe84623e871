// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_directory_core::{Attributes, Filter, Modification, ProtocolError, RawEntry};

/// The wire-level directory session.
///
/// Implementations own connection, bind and transport concerns. Callers
/// await one request at a time; nothing here pipelines or retries.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
	/// Subtree search under `base`, results in server order.
	async fn search(&self, filter: &Filter, base: &str) -> Result<Vec<RawEntry>, ProtocolError>;

	/// Whether anything matches. Implementations that can ask the server for
	/// a single name-only result should override this.
	async fn exists(&self, filter: &Filter, base: &str) -> Result<bool, ProtocolError> {
		Ok(!self.search(filter, base).await?.is_empty())
	}

	async fn add(&self, dn: &str, attributes: &Attributes) -> Result<(), ProtocolError>;

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<(), ProtocolError>;

	async fn delete(&self, dn: &str) -> Result<(), ProtocolError>;
}
