// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::attributes::{Attributes, RawEntry};
use crate::codec;
use crate::dn::Container;
use crate::modification::Modification;

/// A single directory record.
///
/// Reads consult staged edits first, then the attributes from the last load.
/// Staged edits stay local until the session layer saves the entry.
#[derive(Debug, Clone, Default)]
pub struct Entry {
	dn: String,
	loaded: Option<Attributes>,
	// keyed by lower-cased name; the value keeps the caller's spelling
	pending: BTreeMap<String, (String, Option<Vec<String>>)>,
	exists: bool,
	generation: u64,
}

impl Entry {
	/// An entry that has not been created in the directory yet.
	pub fn new(dn: impl Into<String>) -> Self {
		Self {
			dn: dn.into(),
			..Self::default()
		}
	}

	/// Materializes an existing entry from a search result.
	pub fn from_raw(raw: RawEntry) -> Self {
		let mut entry = Self::new(raw.dn.clone());
		entry.load(raw);
		entry
	}

	pub fn dn(&self) -> &str {
		&self.dn
	}

	/// The container holding this entry, when the name parses.
	pub fn container(&self) -> Option<Container> {
		Container::parse(&self.dn).ok().and_then(|c| c.parent())
	}

	pub fn exists(&self) -> bool {
		self.exists
	}

	/// Incremented every time the entry is (re)loaded.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn loaded(&self) -> Option<&Attributes> {
		self.loaded.as_ref()
	}

	/// Current value of an attribute. A staged deletion reads as an empty
	/// slice; attributes the directory never returned read as `None`.
	pub fn attribute(&self, name: &str) -> Option<&[String]> {
		if let Some((_, staged)) = self.pending.get(&name.to_lowercase()) {
			return Some(staged.as_deref().unwrap_or(&[]));
		}
		self.loaded.as_ref().and_then(|attrs| attrs.get(name))
	}

	pub fn first_value(&self, name: &str) -> Option<&str> {
		self.attribute(name)
			.and_then(|values| values.first())
			.map(String::as_str)
	}

	/// Stages new values. An empty list stages a deletion.
	pub fn set_attribute<I, S>(&mut self, name: impl Into<String>, values: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let name = name.into();
		let values: Vec<String> = values.into_iter().map(Into::into).collect();
		let staged = if values.is_empty() { None } else { Some(values) };
		self.pending.insert(name.to_lowercase(), (name, staged));
	}

	pub fn delete_attribute(&mut self, name: impl Into<String>) {
		let name = name.into();
		self.pending.insert(name.to_lowercase(), (name, None));
	}

	pub fn is_dirty(&self) -> bool {
		!self.pending.is_empty()
	}

	/// Staged edits as `(name, values)`; `None` means delete.
	pub fn pending(&self) -> impl Iterator<Item = (&str, Option<&[String]>)> {
		self.pending
			.values()
			.map(|(name, values)| (name.as_str(), values.as_deref()))
	}

	pub fn clear_pending(&mut self) {
		self.pending.clear();
	}

	/// Translates staged edits into modify steps.
	///
	/// Attributes absent from the last load are added rather than replaced;
	/// some servers reject a replace on an attribute that does not exist yet.
	pub fn modifications(&self) -> Vec<Modification> {
		self.pending
			.values()
			.map(|(name, staged)| match staged {
				None => Modification::delete(name.clone()),
				Some(values) => {
					let previously_present = self
						.loaded
						.as_ref()
						.map(|attrs| attrs.contains(name))
						.unwrap_or(false);
					if previously_present {
						Modification::replace(name.clone(), values.clone())
					} else {
						Modification::add(name.clone(), values.clone())
					}
				}
			})
			.collect()
	}

	/// Replaces local state with a fresh search result.
	pub fn load(&mut self, raw: RawEntry) {
		self.dn = raw.dn;
		self.loaded = Some(raw.attributes);
		self.pending.clear();
		self.exists = true;
		self.generation += 1;
	}

	/// Clears local state after the record was deleted.
	pub fn mark_destroyed(&mut self) {
		self.loaded = None;
		self.pending.clear();
		self.exists = false;
		self.generation += 1;
	}

	pub fn when_created(&self) -> Option<DateTime<Utc>> {
		self.first_value("whenCreated")
			.and_then(|v| codec::decode_generalized_time(v).ok())
	}

	pub fn when_changed(&self) -> Option<DateTime<Utc>> {
		self.first_value("whenChanged")
			.and_then(|v| codec::decode_generalized_time(v).ok())
	}
}

/// Entries are the same record when their names match exactly.
impl PartialEq for Entry {
	fn eq(&self, other: &Self) -> bool {
		self.dn == other.dn
	}
}

impl Eq for Entry {}
