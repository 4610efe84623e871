// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process directory used by tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use loom_directory_core::kind::{ATTR_DISTINGUISHED_NAME, ATTR_MEMBER, ATTR_MEMBER_OF};
use loom_directory_core::{
	evaluate_filter, Attributes, Filter, Modification, ModificationKind, Operation, ProtocolError,
	RawEntry,
};
use tracing::debug;

use crate::client::DirectoryClient;

const NO_SUCH_ATTRIBUTE: u32 = 16;
const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const NO_SUCH_OBJECT: u32 = 32;
const ENTRY_ALREADY_EXISTS: u32 = 68;

/// Number of requests served, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
	pub search: usize,
	pub exists: usize,
	pub add: usize,
	pub modify: usize,
	pub delete: usize,
}

impl CallCounts {
	pub fn writes(&self) -> usize {
		self.add + self.modify + self.delete
	}

	pub fn total(&self) -> usize {
		self.search + self.exists + self.writes()
	}
}

#[derive(Default)]
struct State {
	entries: Vec<RawEntry>,
	calls: CallCounts,
	failures: HashMap<Operation, ProtocolError>,
}

impl State {
	fn position(&self, dn: &str) -> Option<usize> {
		self.entries
			.iter()
			.position(|e| e.dn.eq_ignore_ascii_case(dn))
	}

	fn take_failure(&mut self, operation: Operation) -> Result<(), ProtocolError> {
		match self.failures.remove(&operation) {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	fn set_back_link(&mut self, group_dn: &str, member_dn: &str, present: bool) {
		if let Some(idx) = self.position(member_dn) {
			let attrs = &mut self.entries[idx].attributes;
			if present {
				attrs.extend_values(ATTR_MEMBER_OF, [group_dn.to_string()]);
			} else {
				attrs.remove_values(ATTR_MEMBER_OF, &[group_dn.to_string()]);
			}
		}
	}

	/// Brings `memberOf` on referenced entries in line with a change of the
	/// `member` values of `group_dn`.
	fn relink(&mut self, group_dn: &str, before: &[String], after: &[String]) {
		for dn in before {
			if !after.iter().any(|a| a.eq_ignore_ascii_case(dn)) {
				self.set_back_link(group_dn, dn, false);
			}
		}
		for dn in after {
			if !before.iter().any(|b| b.eq_ignore_ascii_case(dn)) {
				self.set_back_link(group_dn, dn, true);
			}
		}
	}

	fn insert(&mut self, mut raw: RawEntry) {
		if !raw.attributes.contains(ATTR_DISTINGUISHED_NAME) {
			raw.attributes
				.insert(ATTR_DISTINGUISHED_NAME, [raw.dn.clone()]);
		}
		raw.attributes.remove(ATTR_MEMBER_OF);

		let dn = raw.dn.clone();
		let members: Vec<String> = raw.attributes.get(ATTR_MEMBER).unwrap_or(&[]).to_vec();
		let existing_groups: Vec<String> = self
			.entries
			.iter()
			.filter(|e| {
				e.attributes
					.get(ATTR_MEMBER)
					.map(|m| m.iter().any(|v| v.eq_ignore_ascii_case(&dn)))
					.unwrap_or(false)
			})
			.map(|e| e.dn.clone())
			.collect();
		if !existing_groups.is_empty() {
			raw.attributes.insert(ATTR_MEMBER_OF, existing_groups);
		}

		self.entries.push(raw);
		self.relink(&dn, &[], &members);
	}
}

/// A [`DirectoryClient`] backed by a vector of entries.
///
/// Searches are subtree searches matched by case-insensitive name suffix.
/// `memberOf` is maintained from `member` the way Active Directory does.
#[derive(Default)]
pub struct MemoryDirectory {
	state: Mutex<State>,
}

impl MemoryDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Seeds an entry without counting it as a request.
	pub fn insert(&self, dn: impl Into<String>, attributes: Attributes) {
		self.lock().insert(RawEntry::new(dn, attributes));
	}

	pub fn get(&self, dn: &str) -> Option<RawEntry> {
		let state = self.lock();
		state.position(dn).map(|idx| state.entries[idx].clone())
	}

	pub fn len(&self) -> usize {
		self.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().entries.is_empty()
	}

	pub fn calls(&self) -> CallCounts {
		self.lock().calls
	}

	/// Makes the next request of `operation` fail with `code`.
	pub fn fail_next(&self, operation: Operation, code: u32, message: impl Into<String>) {
		let err = ProtocolError::new(operation, "", message).with_code(code);
		self.lock().failures.insert(operation, err);
	}

	fn matching(state: &State, filter: &Filter, base: &str) -> Vec<RawEntry> {
		let base = base.to_lowercase();
		let suffix = format!(",{base}");
		state
			.entries
			.iter()
			.filter(|e| {
				let dn = e.dn.to_lowercase();
				base.is_empty() || dn == base || dn.ends_with(&suffix)
			})
			.filter(|e| evaluate_filter(filter, &|name: &str| e.attributes.get(name)))
			.cloned()
			.collect()
	}
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
	async fn search(&self, filter: &Filter, base: &str) -> Result<Vec<RawEntry>, ProtocolError> {
		let mut state = self.lock();
		state.calls.search += 1;
		state
			.take_failure(Operation::Search)
			.map_err(|e| ProtocolError { dn: base.to_string(), ..e })?;
		let results = Self::matching(&state, filter, base);
		debug!(filter = %filter, base, count = results.len(), "memory search");
		Ok(results)
	}

	async fn exists(&self, filter: &Filter, base: &str) -> Result<bool, ProtocolError> {
		let mut state = self.lock();
		state.calls.exists += 1;
		state
			.take_failure(Operation::Search)
			.map_err(|e| ProtocolError { dn: base.to_string(), ..e })?;
		Ok(!Self::matching(&state, filter, base).is_empty())
	}

	async fn add(&self, dn: &str, attributes: &Attributes) -> Result<(), ProtocolError> {
		let mut state = self.lock();
		state.calls.add += 1;
		state
			.take_failure(Operation::Add)
			.map_err(|e| ProtocolError { dn: dn.to_string(), ..e })?;
		if state.position(dn).is_some() {
			return Err(ProtocolError::new(Operation::Add, dn, "entry already exists")
				.with_code(ENTRY_ALREADY_EXISTS));
		}
		state.insert(RawEntry::new(dn, attributes.clone()));
		Ok(())
	}

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<(), ProtocolError> {
		let mut state = self.lock();
		state.calls.modify += 1;
		state
			.take_failure(Operation::Modify)
			.map_err(|e| ProtocolError { dn: dn.to_string(), ..e })?;
		let idx = state.position(dn).ok_or_else(|| {
			ProtocolError::new(Operation::Modify, dn, "no such object").with_code(NO_SUCH_OBJECT)
		})?;

		// Apply to a copy so a failing step leaves the entry untouched.
		let entry_dn = state.entries[idx].dn.clone();
		let before: Vec<String> = state.entries[idx]
			.attributes
			.get(ATTR_MEMBER)
			.unwrap_or(&[])
			.to_vec();
		let mut attrs = state.entries[idx].attributes.clone();

		for m in modifications {
			match m.kind {
				ModificationKind::Add => {
					if let Some(existing) = attrs.get(&m.attribute) {
						if m.values
							.iter()
							.any(|v| existing.iter().any(|e| e.eq_ignore_ascii_case(v)))
						{
							return Err(ProtocolError::new(
								Operation::Modify,
								dn,
								format!("value already present in {}", m.attribute),
							)
							.with_code(ATTRIBUTE_OR_VALUE_EXISTS));
						}
					}
					attrs.extend_values(m.attribute.clone(), m.values.iter().cloned());
				}
				ModificationKind::Replace => {
					if m.values.is_empty() {
						attrs.remove(&m.attribute);
					} else {
						attrs.insert(m.attribute.clone(), m.values.iter().cloned());
					}
				}
				ModificationKind::Delete => {
					if !attrs.contains(&m.attribute) {
						return Err(ProtocolError::new(
							Operation::Modify,
							dn,
							format!("no such attribute {}", m.attribute),
						)
						.with_code(NO_SUCH_ATTRIBUTE));
					}
					if m.values.is_empty() {
						attrs.remove(&m.attribute);
					} else {
						attrs.remove_values(&m.attribute, &m.values);
					}
				}
			}
		}

		let after: Vec<String> = attrs.get(ATTR_MEMBER).unwrap_or(&[]).to_vec();
		state.entries[idx].attributes = attrs;
		state.relink(&entry_dn, &before, &after);
		debug!(dn, count = modifications.len(), "memory modify");
		Ok(())
	}

	async fn delete(&self, dn: &str) -> Result<(), ProtocolError> {
		let mut state = self.lock();
		state.calls.delete += 1;
		state
			.take_failure(Operation::Delete)
			.map_err(|e| ProtocolError { dn: dn.to_string(), ..e })?;
		let idx = state.position(dn).ok_or_else(|| {
			ProtocolError::new(Operation::Delete, dn, "no such object").with_code(NO_SUCH_OBJECT)
		})?;
		let removed = state.entries.remove(idx);

		let gone = [removed.dn.clone()];
		for entry in state.entries.iter_mut() {
			entry.attributes.remove_values(ATTR_MEMBER, &gone);
			entry.attributes.remove_values(ATTR_MEMBER_OF, &gone);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
		pairs
			.iter()
			.map(|(k, v)| (*k, v.iter().copied().collect::<Vec<_>>()))
			.collect()
	}

	#[tokio::test]
	async fn test_search_scopes_by_suffix() {
		let dir = MemoryDirectory::new();
		dir.insert("cn=a,ou=People,dc=example,dc=org", attrs(&[("cn", &["a"])]));
		dir.insert("cn=b,ou=Groups,dc=example,dc=org", attrs(&[("cn", &["b"])]));

		let all = dir
			.search(&Filter::present("cn"), "dc=example,dc=org")
			.await
			.unwrap();
		assert_eq!(all.len(), 2);

		let people = dir
			.search(&Filter::present("cn"), "OU=People,DC=example,DC=org")
			.await
			.unwrap();
		assert_eq!(people.len(), 1);
		assert_eq!(people[0].dn, "cn=a,ou=People,dc=example,dc=org");
		assert_eq!(dir.calls().search, 2);
	}

	#[tokio::test]
	async fn test_member_of_is_maintained() {
		let dir = MemoryDirectory::new();
		dir.insert("cn=u,dc=example", attrs(&[("objectClass", &["user"])]));
		dir.insert(
			"cn=g,dc=example",
			attrs(&[("objectClass", &["group"]), ("member", &["cn=u,dc=example"])]),
		);
		assert_eq!(
			dir.get("cn=u,dc=example").unwrap().get("memberOf").unwrap(),
			&["cn=g,dc=example".to_string()]
		);

		dir.modify(
			"cn=g,dc=example",
			&[Modification::delete_values("member", vec!["cn=u,dc=example".to_string()])],
		)
		.await
		.unwrap();
		assert!(dir.get("cn=u,dc=example").unwrap().get("memberOf").is_none());
	}

	#[tokio::test]
	async fn test_add_existing_value_is_rejected() {
		let dir = MemoryDirectory::new();
		dir.insert("cn=g,dc=example", attrs(&[("member", &["cn=u,dc=example"])]));
		let err = dir
			.modify(
				"cn=g,dc=example",
				&[Modification::add("member", vec!["cn=u,dc=example".to_string()])],
			)
			.await
			.unwrap_err();
		assert_eq!(err.code, Some(ATTRIBUTE_OR_VALUE_EXISTS));
	}

	#[tokio::test]
	async fn test_injected_failure_is_consumed_once() {
		let dir = MemoryDirectory::new();
		dir.insert("cn=x,dc=example", Attributes::new());
		dir.fail_next(Operation::Delete, 51, "busy");

		let err = dir.delete("cn=x,dc=example").await.unwrap_err();
		assert_eq!(err.code, Some(51));
		assert_eq!(err.dn, "cn=x,dc=example");

		dir.delete("cn=x,dc=example").await.unwrap();
		assert!(dir.is_empty());
	}

	#[tokio::test]
	async fn test_delete_removes_references() {
		let dir = MemoryDirectory::new();
		dir.insert("cn=u,dc=example", Attributes::new());
		dir.insert("cn=g,dc=example", attrs(&[("member", &["cn=u,dc=example"])]));
		dir.delete("cn=u,dc=example").await.unwrap();
		assert!(dir.get("cn=g,dc=example").unwrap().get("member").is_none());
	}
}
