// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::kind::{Group, User};

/// Result of a membership query.
///
/// `complete` is false when the traversal stopped early (cancelled, timed
/// out or hit the depth limit); `members` then holds what was found so far.
/// Stale references and revisited groups are counted, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership<T> {
	pub members: Vec<T>,
	pub complete: bool,
	pub cycles: usize,
	pub stale: usize,
}

impl<T> Membership<T> {
	pub fn complete(members: Vec<T>) -> Self {
		Self {
			members,
			complete: true,
			cycles: 0,
			stale: 0,
		}
	}

	/// Partial result of a traversal that stopped early.
	pub fn incomplete(members: Vec<T>) -> Self {
		Self {
			members,
			complete: false,
			cycles: 0,
			stale: 0,
		}
	}

	pub fn is_incomplete(&self) -> bool {
		!self.complete
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

impl<T> Default for Membership<T> {
	fn default() -> Self {
		Self::complete(Vec::new())
	}
}

/// Memoized membership results of one group, valid for a single load
/// generation of that group. All four are dropped together.
#[derive(Debug, Clone, Default)]
pub struct MembershipCache {
	generation: u64,
	pub direct_users: Option<Membership<User>>,
	pub direct_groups: Option<Membership<Group>>,
	pub transitive_users: Option<Membership<User>>,
	pub transitive_groups: Option<Membership<Group>>,
}

impl MembershipCache {
	/// Drops every memoized result if they were computed for another
	/// generation.
	pub fn sync_generation(&mut self, generation: u64) {
		if self.generation != generation {
			self.clear();
			self.generation = generation;
		}
	}

	pub fn clear(&mut self) {
		self.direct_users = None;
		self.direct_groups = None;
		self.transitive_users = None;
		self.transitive_groups = None;
	}

	pub fn is_empty(&self) -> bool {
		self.direct_users.is_none()
			&& self.direct_groups.is_none()
			&& self.transitive_users.is_none()
			&& self.transitive_groups.is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generation_change_clears_everything() {
		let mut cache = MembershipCache::default();
		cache.sync_generation(1);
		cache.direct_users = Some(Membership::complete(Vec::new()));
		cache.transitive_groups = Some(Membership::complete(Vec::new()));

		cache.sync_generation(1);
		assert!(!cache.is_empty());

		cache.sync_generation(2);
		assert!(cache.is_empty());
	}
}
