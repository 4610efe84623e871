// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group membership queries.
//!
//! Traversals keep a visited set of group names, so cyclic nesting
//! terminates. A traversal stopped by cancellation, its deadline or the
//! depth limit returns what it found with `complete = false`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_directory_core::kind::{ATTR_DISTINGUISHED_NAME, ATTR_MEMBER, ATTR_MEMBER_OF};
use loom_directory_core::{
	DirectoryError, EntryKind, Filter, Group, Membership, Modification, ProtocolError, Result, User,
};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::DirectoryConfig;
use crate::directory::Directory;

/// Most names combined into one lookup search.
pub const LOOKUP_BATCH: usize = 200;

#[derive(Clone, Debug)]
pub struct CancellationToken {
	cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self {
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}

/// Limits applied to every query of a [`MembershipResolver`].
#[derive(Debug, Clone)]
pub struct TraversalBudget {
	pub cancellation: CancellationToken,
	/// Wall-clock limit per query, measured from its start.
	pub timeout: Option<Duration>,
	/// Deepest nested group whose members are followed; the root is depth 0.
	pub max_depth: u32,
}

impl TraversalBudget {
	pub fn from_config(config: &DirectoryConfig) -> Self {
		Self {
			cancellation: CancellationToken::new(),
			timeout: Some(config.traversal_timeout),
			max_depth: config.max_depth,
		}
	}

	pub fn unbounded() -> Self {
		Self {
			cancellation: CancellationToken::new(),
			timeout: None,
			max_depth: u32::MAX,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
	Cancelled,
	DeadlineExpired,
}

impl fmt::Display for Stop {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Cancelled => f.write_str("cancelled"),
			Self::DeadlineExpired => f.write_str("deadline expired"),
		}
	}
}

enum Interrupt {
	Stopped(Stop),
	Failed(DirectoryError),
}

impl From<ProtocolError> for Interrupt {
	fn from(err: ProtocolError) -> Self {
		Self::Failed(err.into())
	}
}

/// Per-query limits, fixed when the query starts.
struct Walk {
	cancellation: CancellationToken,
	deadline: Option<Instant>,
}

impl Walk {
	fn check(&self) -> std::result::Result<(), Interrupt> {
		if self.cancellation.is_cancelled() {
			return Err(Interrupt::Stopped(Stop::Cancelled));
		}
		if self.deadline.is_some_and(|d| Instant::now() >= d) {
			return Err(Interrupt::Stopped(Stop::DeadlineExpired));
		}
		Ok(())
	}
}

/// One group's `member` values, split by kind.
struct Resolved {
	users: Vec<User>,
	groups: Vec<Group>,
	stale: usize,
}

#[derive(Default)]
struct Traversal {
	users: Vec<User>,
	groups: Vec<Group>,
	visited: HashSet<String>,
	seen_users: HashSet<String>,
	cycles: usize,
	stale: usize,
	depth_limited: bool,
}

impl Traversal {
	fn absorb(&mut self, resolved: Resolved, depth: u32, stack: &mut Vec<(Group, u32)>) {
		self.stale += resolved.stale;
		for user in resolved.users {
			if self.seen_users.insert(user.dn().to_lowercase()) {
				self.users.push(user);
			}
		}
		// reversed so the first listed group is expanded first
		for group in resolved.groups.into_iter().rev() {
			stack.push((group, depth + 1));
		}
	}

	fn finish(self, complete: bool) -> (Membership<User>, Membership<Group>) {
		let complete = complete && !self.depth_limited;
		(
			Membership {
				members: self.users,
				complete,
				cycles: self.cycles,
				stale: self.stale,
			},
			Membership {
				members: self.groups,
				complete,
				cycles: self.cycles,
				stale: self.stale,
			},
		)
	}
}

/// Resolves and mutates group membership through a [`Directory`].
pub struct MembershipResolver<'d> {
	directory: &'d Directory,
	budget: TraversalBudget,
}

impl<'d> MembershipResolver<'d> {
	pub fn new(directory: &'d Directory) -> Self {
		Self {
			directory,
			budget: TraversalBudget::from_config(directory.config()),
		}
	}

	pub fn with_budget(mut self, budget: TraversalBudget) -> Self {
		self.budget = budget;
		self
	}

	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.budget.cancellation = token;
		self
	}

	pub fn budget(&self) -> &TraversalBudget {
		&self.budget
	}

	fn begin(&self) -> Walk {
		Walk {
			cancellation: self.budget.cancellation.clone(),
			deadline: self.budget.timeout.map(|t| Instant::now() + t),
		}
	}

	/// Looks up entries of kind `K` named in `dns`, at most [`LOOKUP_BATCH`]
	/// names per search, returned in `dns` order. Names that match nothing
	/// are left out.
	async fn lookup<K: EntryKind>(
		&self,
		walk: &Walk,
		dns: &[String],
	) -> std::result::Result<Vec<K>, Interrupt> {
		let mut found = HashMap::new();
		for batch in dns.chunks(LOOKUP_BATCH) {
			let Some(by_name) = Filter::any(
				batch
					.iter()
					.map(|dn| Filter::equals(ATTR_DISTINGUISHED_NAME, dn)),
			) else {
				continue;
			};
			walk.check()?;

			let filter = Directory::search_filter::<K>(Some(by_name));
			let search = self.directory.client().search(&filter, self.directory.base());
			let raw = match walk.deadline {
				Some(deadline) => timeout_at(deadline, search)
					.await
					.map_err(|_| Interrupt::Stopped(Stop::DeadlineExpired))??,
				None => search.await?,
			};
			found.extend(raw.into_iter().map(|r| (r.dn.to_lowercase(), r)));
		}

		Ok(dns
			.iter()
			.filter_map(|dn| found.remove(&dn.to_lowercase()))
			.map(K::from_raw)
			.collect())
	}

	async fn resolve(&self, walk: &Walk, dns: &[String]) -> std::result::Result<Resolved, Interrupt> {
		let users: Vec<User> = self.lookup(walk, dns).await?;
		let found: HashSet<String> = users.iter().map(|u| u.dn().to_lowercase()).collect();
		let remaining: Vec<String> = dns
			.iter()
			.filter(|dn| !found.contains(&dn.to_lowercase()))
			.cloned()
			.collect();

		let groups: Vec<Group> = self.lookup(walk, &remaining).await?;
		let unique: HashSet<String> = remaining.iter().map(|dn| dn.to_lowercase()).collect();
		let stale = unique.len() - groups.len();
		if stale > 0 {
			debug!(stale, "member references resolved to nothing");
		}

		Ok(Resolved {
			users,
			groups,
			stale,
		})
	}

	/// Resolves both direct member lists and memoizes them together.
	async fn direct(&self, group: &mut Group) -> Result<(Membership<User>, Membership<Group>)> {
		let walk = self.begin();
		let dns = group.member_dns().to_vec();
		match self.resolve(&walk, &dns).await {
			Ok(resolved) => {
				let users = Membership {
					members: resolved.users,
					complete: true,
					cycles: 0,
					stale: resolved.stale,
				};
				let groups = Membership {
					members: resolved.groups,
					complete: true,
					cycles: 0,
					stale: resolved.stale,
				};
				let cache = group.cache();
				cache.direct_users = Some(users.clone());
				cache.direct_groups = Some(groups.clone());
				Ok((users, groups))
			}
			Err(Interrupt::Stopped(stop)) => {
				warn!(dn = group.dn(), reason = %stop, "direct membership lookup stopped early");
				Ok((Membership::incomplete(Vec::new()), Membership::incomplete(Vec::new())))
			}
			Err(Interrupt::Failed(err)) => Err(err),
		}
	}

	#[instrument(skip_all, fields(group = %group.dn()))]
	pub async fn direct_users(&self, group: &mut Group) -> Result<Membership<User>> {
		if let Some(hit) = group.cache().direct_users.clone() {
			debug!("direct users served from cache");
			return Ok(hit);
		}
		Ok(self.direct(group).await?.0)
	}

	#[instrument(skip_all, fields(group = %group.dn()))]
	pub async fn direct_groups(&self, group: &mut Group) -> Result<Membership<Group>> {
		if let Some(hit) = group.cache().direct_groups.clone() {
			debug!("direct groups served from cache");
			return Ok(hit);
		}
		Ok(self.direct(group).await?.1)
	}

	async fn traverse(
		&self,
		walk: &Walk,
		root: &Group,
		t: &mut Traversal,
	) -> std::result::Result<(), Interrupt> {
		t.visited.insert(root.dn().to_lowercase());
		let mut stack = Vec::new();

		let resolved = self.resolve(walk, root.member_dns()).await?;
		t.absorb(resolved, 0, &mut stack);

		while let Some((group, depth)) = stack.pop() {
			if !t.visited.insert(group.dn().to_lowercase()) {
				debug!(dn = group.dn(), "group already visited, skipping");
				t.cycles += 1;
				continue;
			}

			let member_dns = group.member_dns().to_vec();
			t.groups.push(group);
			if member_dns.is_empty() {
				continue;
			}
			if depth > self.budget.max_depth {
				t.depth_limited = true;
				continue;
			}

			let resolved = self.resolve(walk, &member_dns).await?;
			t.absorb(resolved, depth, &mut stack);
		}
		Ok(())
	}

	/// Walks nested groups depth first and memoizes both transitive lists
	/// when the walk completes.
	async fn transitive(&self, root: &mut Group) -> Result<(Membership<User>, Membership<Group>)> {
		let walk = self.begin();
		let mut traversal = Traversal::default();

		let complete = match self.traverse(&walk, root, &mut traversal).await {
			Ok(()) => true,
			Err(Interrupt::Stopped(stop)) => {
				warn!(
					dn = root.dn(),
					reason = %stop,
					found = traversal.users.len() + traversal.groups.len(),
					"membership traversal stopped early"
				);
				false
			}
			Err(Interrupt::Failed(err)) => return Err(err),
		};
		if traversal.depth_limited {
			warn!(
				dn = root.dn(),
				max_depth = self.budget.max_depth,
				"membership traversal hit the depth limit"
			);
		}

		let (users, groups) = traversal.finish(complete);
		if users.complete {
			let cache = root.cache();
			cache.transitive_users = Some(users.clone());
			cache.transitive_groups = Some(groups.clone());
		}
		Ok((users, groups))
	}

	#[instrument(skip_all, fields(group = %group.dn()))]
	pub async fn transitive_users(&self, group: &mut Group) -> Result<Membership<User>> {
		if let Some(hit) = group.cache().transitive_users.clone() {
			debug!("transitive users served from cache");
			return Ok(hit);
		}
		Ok(self.transitive(group).await?.0)
	}

	#[instrument(skip_all, fields(group = %group.dn()))]
	pub async fn transitive_groups(&self, group: &mut Group) -> Result<Membership<Group>> {
		if let Some(hit) = group.cache().transitive_groups.clone() {
			debug!("transitive groups served from cache");
			return Ok(hit);
		}
		Ok(self.transitive(group).await?.1)
	}

	/// Groups named in the entry's `memberOf`, resolved. Not transitive.
	#[instrument(skip_all, fields(dn = %entry.entry().dn()))]
	pub async fn reverse_groups<K: EntryKind>(&self, entry: &K) -> Result<Membership<Group>> {
		let dns = entry
			.entry()
			.attribute(ATTR_MEMBER_OF)
			.unwrap_or(&[])
			.to_vec();
		let walk = self.begin();
		match self.lookup::<Group>(&walk, &dns).await {
			Ok(groups) => {
				let unique: HashSet<String> = dns.iter().map(|dn| dn.to_lowercase()).collect();
				Ok(Membership {
					stale: unique.len() - groups.len(),
					members: groups,
					complete: true,
					cycles: 0,
				})
			}
			Err(Interrupt::Stopped(stop)) => {
				warn!(reason = %stop, "reverse group lookup stopped early");
				Ok(Membership::incomplete(Vec::new()))
			}
			Err(Interrupt::Failed(err)) => Err(err),
		}
	}

	/// Whether `group` appears in the entry's `memberOf`. Direct membership
	/// only; use [`MembershipResolver::transitive_groups`] for ancestry.
	pub fn is_member_of<K: EntryKind>(&self, entry: &K, group: &Group) -> bool {
		entry
			.entry()
			.attribute(ATTR_MEMBER_OF)
			.unwrap_or(&[])
			.iter()
			.any(|dn| dn.eq_ignore_ascii_case(group.dn()))
	}

	/// Reloads `group` after a membership write and stages the caller's
	/// pending edits again.
	async fn reload_keeping_edits(&self, group: &mut Group) -> Result<()> {
		let staged: Vec<(String, Option<Vec<String>>)> = group
			.entry()
			.pending()
			.map(|(name, values)| (name.to_string(), values.map(<[String]>::to_vec)))
			.collect();
		if !self.directory.reload(group).await? {
			return Ok(());
		}

		if !staged.is_empty() {
			debug!(count = staged.len(), "restaging pending edits");
		}
		let entry = group.entry_mut();
		for (name, values) in staged {
			match values {
				Some(values) => entry.set_attribute(name, values),
				None => entry.delete_attribute(name),
			}
		}
		Ok(())
	}

	/// Adds `member` to the group. Returns whether the directory was changed;
	/// an existing member is left alone. Other staged edits on `group` stay
	/// staged.
	#[instrument(skip_all, fields(group = %group.dn(), member = %member.entry().dn()))]
	pub async fn add_member<K: EntryKind>(&self, group: &mut Group, member: &K) -> Result<bool> {
		if !group.exists() {
			return Err(DirectoryError::NotPersisted(group.dn().to_string()));
		}
		let member_dn = member.entry().dn().to_string();
		if group.has_member_dn(&member_dn) {
			debug!("already a member");
			return Ok(false);
		}

		self.directory
			.client()
			.modify(group.dn(), &[Modification::add(ATTR_MEMBER, vec![member_dn])])
			.await?;
		info!("added group member");
		self.reload_keeping_edits(group).await?;
		Ok(true)
	}

	/// Removes `member` from the group. Returns whether the directory was
	/// changed; a non-member is left alone. Other staged edits on `group` stay
	/// staged.
	#[instrument(skip_all, fields(group = %group.dn(), member = %member.entry().dn()))]
	pub async fn remove_member<K: EntryKind>(&self, group: &mut Group, member: &K) -> Result<bool> {
		if !group.exists() {
			return Err(DirectoryError::NotPersisted(group.dn().to_string()));
		}
		let member_dn = member.entry().dn().to_string();
		if !group.has_member_dn(&member_dn) {
			debug!("not a member");
			return Ok(false);
		}

		self.directory
			.client()
			.modify(
				group.dn(),
				&[Modification::delete_values(ATTR_MEMBER, vec![member_dn])],
			)
			.await?;
		info!("removed group member");
		self.reload_keeping_edits(group).await?;
		Ok(true)
	}
}
