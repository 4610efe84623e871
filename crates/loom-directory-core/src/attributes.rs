// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute name to values, looked up case-insensitively.
///
/// The spelling used when an attribute is first inserted is kept for
/// requests sent back to the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
	entries: BTreeMap<String, (String, Vec<String>)>,
}

impl Attributes {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&[String]> {
		self.entries
			.get(&name.to_lowercase())
			.map(|(_, values)| values.as_slice())
	}

	pub fn first(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(|v| v.first()).map(String::as_str)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(&name.to_lowercase())
	}

	pub fn insert<I, S>(&mut self, name: impl Into<String>, values: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let name = name.into();
		let values: Vec<String> = values.into_iter().map(Into::into).collect();
		match self.entries.get_mut(&name.to_lowercase()) {
			Some((_, existing)) => *existing = values,
			None => {
				self.entries.insert(name.to_lowercase(), (name, values));
			}
		}
	}

	/// Adds values not already present (case-insensitive) to an attribute.
	pub fn extend_values<I, S>(&mut self, name: impl Into<String>, values: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let name = name.into();
		let key = name.to_lowercase();
		let (_, existing) = self
			.entries
			.entry(key)
			.or_insert_with(|| (name, Vec::new()));
		for value in values {
			let value = value.into();
			if !existing.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
				existing.push(value);
			}
		}
	}

	/// Removes the given values (case-insensitive); drops the attribute once
	/// it has none left.
	pub fn remove_values(&mut self, name: &str, values: &[String]) {
		let key = name.to_lowercase();
		if let Some((_, existing)) = self.entries.get_mut(&key) {
			existing.retain(|v| !values.iter().any(|r| r.eq_ignore_ascii_case(v)));
			if existing.is_empty() {
				self.entries.remove(&key);
			}
		}
	}

	pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
		self.entries
			.remove(&name.to_lowercase())
			.map(|(_, values)| values)
	}

	/// Iterates `(name, values)` using the original spelling of each name.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.entries
			.values()
			.map(|(name, values)| (name.as_str(), values.as_slice()))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.values().map(|(name, _)| name.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
	K: Into<String>,
	V: IntoIterator,
	V::Item: Into<String>,
{
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		let mut attrs = Self::new();
		for (name, values) in iter {
			attrs.insert(name, values);
		}
		attrs
	}
}

/// A search result as delivered by the protocol collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
	pub dn: String,
	pub attributes: Attributes,
}

impl RawEntry {
	pub fn new(dn: impl Into<String>, attributes: Attributes) -> Self {
		Self {
			dn: dn.into(),
			attributes,
		}
	}

	pub fn get(&self, name: &str) -> Option<&[String]> {
		self.attributes.get(name)
	}
}
