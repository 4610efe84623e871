// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationKind {
	Add,
	Replace,
	Delete,
}

/// One step of a modify request. A `Delete` with no values removes the whole
/// attribute; with values it removes only those values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
	pub kind: ModificationKind,
	pub attribute: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub values: Vec<String>,
}

impl Modification {
	pub fn add(attribute: impl Into<String>, values: Vec<String>) -> Self {
		Self {
			kind: ModificationKind::Add,
			attribute: attribute.into(),
			values,
		}
	}

	pub fn replace(attribute: impl Into<String>, values: Vec<String>) -> Self {
		Self {
			kind: ModificationKind::Replace,
			attribute: attribute.into(),
			values,
		}
	}

	pub fn delete(attribute: impl Into<String>) -> Self {
		Self {
			kind: ModificationKind::Delete,
			attribute: attribute.into(),
			values: Vec::new(),
		}
	}

	pub fn delete_values(attribute: impl Into<String>, values: Vec<String>) -> Self {
		Self {
			kind: ModificationKind::Delete,
			attribute: attribute.into(),
			values,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_serializes_lowercase_kind() {
		let json = serde_json::to_value(Modification::delete("mail")).unwrap();
		assert_eq!(json["kind"], "delete");
		assert!(json.get("values").is_none());
	}
}
