// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query engine and persistence for typed entries.

use std::fmt::Display;
use std::sync::Arc;

use loom_directory_core::dn::scope_under;
use loom_directory_core::kind::{ATTR_DISTINGUISHED_NAME, ATTR_OBJECT_CLASS};
use loom_directory_core::{
	Attributes, Cardinality, Container, DirectoryError, EntryKind, Filter, FinderRequest, Result,
	ValidationError,
};
use tracing::{debug, info, instrument};

use crate::client::DirectoryClient;
use crate::config::DirectoryConfig;
use crate::membership::MembershipResolver;

/// Result of a [`Directory::find`], shaped by the requested cardinality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found<K> {
	First(Option<K>),
	All(Vec<K>),
}

impl<K> Found<K> {
	pub fn into_first(self) -> Option<K> {
		match self {
			Self::First(first) => first,
			Self::All(all) => all.into_iter().next(),
		}
	}

	pub fn into_all(self) -> Vec<K> {
		match self {
			Self::First(first) => first.into_iter().collect(),
			Self::All(all) => all,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::First(first) => usize::from(first.is_some()),
			Self::All(all) => all.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// A directory session: a collaborator handle plus the resolved config.
///
/// Cheap to clone; clones share the collaborator.
#[derive(Clone)]
pub struct Directory {
	client: Arc<dyn DirectoryClient>,
	config: DirectoryConfig,
}

impl Directory {
	pub fn new(client: Arc<dyn DirectoryClient>, config: DirectoryConfig) -> Self {
		Self { client, config }
	}

	pub fn client(&self) -> &Arc<dyn DirectoryClient> {
		&self.client
	}

	pub fn config(&self) -> &DirectoryConfig {
		&self.config
	}

	pub fn base(&self) -> &str {
		&self.config.base
	}

	/// Membership queries and mutations bounded by the configured budget.
	pub fn membership(&self) -> MembershipResolver<'_> {
		MembershipResolver::new(self)
	}

	/// The kind's type filter AND-ed with the caller's, type filter first.
	pub fn search_filter<K: EntryKind>(filter: Option<Filter>) -> Filter {
		match (K::type_filter(), filter) {
			(Some(kind), Some(filter)) => kind.and(filter),
			(Some(kind), None) => kind,
			(None, Some(filter)) => filter,
			(None, None) => Filter::present(ATTR_OBJECT_CLASS),
		}
	}

	#[instrument(skip(self, filter, scope), fields(kind = K::NAME))]
	pub async fn find<K: EntryKind>(
		&self,
		cardinality: Cardinality,
		filter: Option<Filter>,
		scope: Option<&Container>,
	) -> Result<Found<K>> {
		let filter = Self::search_filter::<K>(filter);
		let base = scope_under(scope, self.base());
		debug!(filter = %filter, base = %base, ?cardinality, "searching directory");

		let results = self.client.search(&filter, &base).await?;
		debug!(count = results.len(), "search returned");

		Ok(match cardinality {
			Cardinality::First => Found::First(results.into_iter().next().map(K::from_raw)),
			Cardinality::All => Found::All(results.into_iter().map(K::from_raw).collect()),
		})
	}

	pub async fn find_first<K: EntryKind>(&self, filter: Option<Filter>) -> Result<Option<K>> {
		Ok(self.find(Cardinality::First, filter, None).await?.into_first())
	}

	pub async fn find_all<K: EntryKind>(&self, filter: Option<Filter>) -> Result<Vec<K>> {
		Ok(self.find(Cardinality::All, filter, None).await?.into_all())
	}

	/// Runs a finder request such as `find all by sAMAccountName and mail`.
	///
	/// Malformed requests and argument-count mismatches fail before anything
	/// is sent to the directory.
	pub async fn find_by<K, I, V>(&self, request: &str, args: I) -> Result<Found<K>>
	where
		K: EntryKind,
		I: IntoIterator<Item = V>,
		V: Display,
	{
		let request = FinderRequest::parse(request, args)?;
		self.find(request.cardinality, Some(request.filter), None)
			.await
	}

	pub async fn find_by_dn<K: EntryKind>(&self, dn: &str) -> Result<Option<K>> {
		self.find_first(Some(Filter::equals(ATTR_DISTINGUISHED_NAME, dn)))
			.await
	}

	/// Like [`Directory::find_by_dn`] but a miss is an error.
	pub async fn get<K: EntryKind>(&self, dn: &str) -> Result<K> {
		self.find_by_dn(dn)
			.await?
			.ok_or_else(|| DirectoryError::NotFound(dn.to_string()))
	}

	/// Whether at least one entry of this kind matches. Does not materialize
	/// entries.
	#[instrument(skip(self, filter), fields(kind = K::NAME))]
	pub async fn exists<K: EntryKind>(&self, filter: Option<Filter>) -> Result<bool> {
		let filter = Self::search_filter::<K>(filter);
		Ok(self.client.exists(&filter, self.base()).await?)
	}

	/// Writes staged edits, then reloads.
	///
	/// A clean entry saves trivially. On failure the staged edits stay in
	/// place.
	#[instrument(skip_all, fields(dn = %item.entry().dn()))]
	pub async fn save<K: EntryKind>(&self, item: &mut K) -> Result<()> {
		if !item.entry().is_dirty() {
			return Ok(());
		}
		if !item.entry().exists() {
			return Err(DirectoryError::NotPersisted(item.entry().dn().to_string()));
		}

		let modifications = item.entry().modifications();
		self.client
			.modify(item.entry().dn(), &modifications)
			.await?;
		info!(count = modifications.len(), "saved entry");

		item.entry_mut().clear_pending();
		self.reload(item).await?;
		Ok(())
	}

	pub async fn update_attribute<K, I, S>(&self, item: &mut K, name: &str, values: I) -> Result<()>
	where
		K: EntryKind,
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		item.entry_mut().set_attribute(name, values);
		self.save(item).await
	}

	pub async fn update_attributes<K, I, N, S>(&self, item: &mut K, pairs: I) -> Result<()>
	where
		K: EntryKind,
		I: IntoIterator<Item = (N, Vec<S>)>,
		N: Into<String>,
		S: Into<String>,
	{
		for (name, values) in pairs {
			item.entry_mut().set_attribute(name, values);
		}
		self.save(item).await
	}

	/// Re-fetches the entry by name and drops derived state.
	///
	/// Returns `false` when the entry does not exist, or no longer does.
	#[instrument(skip_all, fields(dn = %item.entry().dn()))]
	pub async fn reload<K: EntryKind>(&self, item: &mut K) -> Result<bool> {
		if !item.entry().exists() {
			return Ok(false);
		}

		let filter = Filter::equals(ATTR_DISTINGUISHED_NAME, item.entry().dn());
		let fresh = self.client.search(&filter, self.base()).await?;
		match fresh.into_iter().next() {
			Some(raw) => {
				item.entry_mut().load(raw);
				item.invalidate();
				debug!(generation = item.entry().generation(), "reloaded entry");
				Ok(true)
			}
			None => {
				debug!("entry vanished from directory");
				item.entry_mut().mark_destroyed();
				item.invalidate();
				Ok(false)
			}
		}
	}

	/// Creates a record and returns it as loaded from the directory.
	///
	/// Fails before any request when a mandatory attribute is missing. The
	/// kind's required attributes are merged in; caller values win except for
	/// `objectClass`, whose values are unioned. Returns `None` when the
	/// new record cannot be read back unambiguously.
	#[instrument(skip(self, attributes), fields(kind = K::NAME))]
	pub async fn create<K: EntryKind>(&self, dn: &str, attributes: Attributes) -> Result<Option<K>> {
		if dn.trim().is_empty() {
			return Err(ValidationError::EmptyDn.into());
		}

		for name in K::mandatory_attributes() {
			let present = attributes.get(name).map(|v| !v.is_empty()).unwrap_or(false);
			if !present {
				return Err(ValidationError::MissingAttribute(name.to_string()).into());
			}
		}

		let mut merged = attributes;
		let required = K::required_attributes();
		for (name, values) in required.iter() {
			if name.eq_ignore_ascii_case(ATTR_OBJECT_CLASS) {
				merged.extend_values(name, values.iter().cloned());
			} else if !merged.contains(name) {
				merged.insert(name, values.iter().cloned());
			}
		}

		self.client.add(dn, &merged).await?;
		info!("created entry");

		let filter = Self::search_filter::<K>(Some(Filter::equals(ATTR_DISTINGUISHED_NAME, dn)));
		let mut found = self.client.search(&filter, self.base()).await?;
		if found.len() != 1 {
			debug!(count = found.len(), "created entry could not be read back");
			return Ok(None);
		}
		Ok(found.pop().map(K::from_raw))
	}

	/// Deletes the record. Returns `false` when the entry does not exist.
	#[instrument(skip_all, fields(dn = %item.entry().dn()))]
	pub async fn destroy<K: EntryKind>(&self, item: &mut K) -> Result<bool> {
		if !item.entry().exists() {
			return Ok(false);
		}

		self.client.delete(item.entry().dn()).await?;
		info!("destroyed entry");

		item.entry_mut().mark_destroyed();
		item.invalidate();
		Ok(true)
	}
}
