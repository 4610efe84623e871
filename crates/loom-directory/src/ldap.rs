// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`DirectoryClient`] over LDAP, using `ldap3`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry, SearchOptions};
use loom_directory_core::{
	Attributes, Filter, Modification, ModificationKind, Operation, ProtocolError, RawEntry,
};
use tracing::{debug, info, warn};

use crate::client::DirectoryClient;
use crate::config::DirectoryConfig;

const SUCCESS: u32 = 0;
const SIZE_LIMIT_EXCEEDED: u32 = 4;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Requests no attributes, only names.
const NO_ATTRIBUTES: &str = "1.1";

/// An LDAP session. Clones share the underlying connection.
#[derive(Clone)]
pub struct LdapClient {
	ldap: Ldap,
}

fn check(operation: Operation, dn: &str, result: LdapResult) -> Result<LdapResult, ProtocolError> {
	if result.rc == SUCCESS {
		Ok(result)
	} else {
		Err(ProtocolError::new(operation, dn, result.text.clone()).with_code(result.rc))
	}
}

fn transport(operation: Operation, dn: &str) -> impl FnOnce(ldap3::LdapError) -> ProtocolError + '_ {
	move |e| ProtocolError::new(operation, dn, e.to_string())
}

fn to_raw(entry: SearchEntry) -> RawEntry {
	let attributes: Attributes = entry.attrs.into_iter().collect();
	RawEntry::new(entry.dn, attributes)
}

impl LdapClient {
	/// Connects to `config.url` and binds as `config.bind_dn` when one is
	/// configured. The connection driver runs on a spawned task.
	pub async fn connect(config: &DirectoryConfig) -> Result<Self, ProtocolError> {
		let url = config.url.as_deref().ok_or_else(|| {
			ProtocolError::new(Operation::Connect, "", "no directory url configured")
		})?;

		debug!(url = %url, "connecting to directory");
		let settings = LdapConnSettings::new().set_conn_timeout(CONNECT_TIMEOUT);
		let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url)
			.await
			.map_err(transport(Operation::Connect, url))?;

		tokio::spawn(async move {
			if let Err(e) = conn.drive().await {
				warn!(error = %e, "directory connection driver error");
			}
		});

		if let Some(bind_dn) = config.bind_dn.as_deref() {
			let password = config
				.bind_password
				.as_ref()
				.map(|p| p.expose())
				.unwrap_or("");
			debug!(bind_dn = %bind_dn, "binding");
			let result = ldap
				.simple_bind(bind_dn, password)
				.await
				.map_err(transport(Operation::Bind, bind_dn))?;
			check(Operation::Bind, bind_dn, result)?;
		}

		info!(url = %url, "directory connection established");
		Ok(Self { ldap })
	}

	pub async fn close(mut self) -> Result<(), ProtocolError> {
		self.ldap
			.unbind()
			.await
			.map_err(transport(Operation::Connect, ""))
	}
}

#[async_trait]
impl DirectoryClient for LdapClient {
	async fn search(&self, filter: &Filter, base: &str) -> Result<Vec<RawEntry>, ProtocolError> {
		let mut ldap = self.ldap.clone();
		let rendered = filter.render();
		let ldap3::SearchResult(entries, result) = ldap
			.search(base, Scope::Subtree, &rendered, vec!["*"])
			.await
			.map_err(transport(Operation::Search, base))?;
		check(Operation::Search, base, result)?;

		debug!(filter = %rendered, base, count = entries.len(), "ldap search");
		Ok(entries
			.into_iter()
			.map(SearchEntry::construct)
			.map(to_raw)
			.collect())
	}

	async fn exists(&self, filter: &Filter, base: &str) -> Result<bool, ProtocolError> {
		let mut ldap = self.ldap.clone();
		let ldap3::SearchResult(entries, result) = ldap
			.with_search_options(SearchOptions::new().sizelimit(1))
			.search(base, Scope::Subtree, &filter.render(), vec![NO_ATTRIBUTES])
			.await
			.map_err(transport(Operation::Search, base))?;
		if result.rc != SIZE_LIMIT_EXCEEDED {
			check(Operation::Search, base, result)?;
		}
		Ok(!entries.is_empty())
	}

	async fn add(&self, dn: &str, attributes: &Attributes) -> Result<(), ProtocolError> {
		let mut ldap = self.ldap.clone();
		let attrs: Vec<(&str, HashSet<&str>)> = attributes
			.iter()
			.map(|(name, values)| (name, values.iter().map(String::as_str).collect()))
			.collect();
		let result = ldap
			.add(dn, attrs)
			.await
			.map_err(transport(Operation::Add, dn))?;
		check(Operation::Add, dn, result)?;
		Ok(())
	}

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<(), ProtocolError> {
		let mut ldap = self.ldap.clone();
		let mods: Vec<Mod<&str>> = modifications
			.iter()
			.map(|m| {
				let values: HashSet<&str> = m.values.iter().map(String::as_str).collect();
				let name = m.attribute.as_str();
				match m.kind {
					ModificationKind::Add => Mod::Add(name, values),
					ModificationKind::Replace => Mod::Replace(name, values),
					ModificationKind::Delete => Mod::Delete(name, values),
				}
			})
			.collect();
		let result = ldap
			.modify(dn, mods)
			.await
			.map_err(transport(Operation::Modify, dn))?;
		check(Operation::Modify, dn, result)?;
		Ok(())
	}

	async fn delete(&self, dn: &str) -> Result<(), ProtocolError> {
		let mut ldap = self.ldap.clone();
		let result = ldap
			.delete(dn)
			.await
			.map_err(transport(Operation::Delete, dn))?;
		check(Operation::Delete, dn, result)?;
		Ok(())
	}
}
