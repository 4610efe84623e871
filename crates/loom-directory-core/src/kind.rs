// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed directory entries: users, groups and computers.

use std::ops::Deref;

use chrono::{DateTime, Utc};

use crate::attributes::{Attributes, RawEntry};
use crate::codec;
use crate::entry::Entry;
use crate::filter::Filter;
use crate::membership::MembershipCache;

pub const ATTR_OBJECT_CLASS: &str = "objectClass";
pub const ATTR_MEMBER: &str = "member";
pub const ATTR_MEMBER_OF: &str = "memberOf";
pub const ATTR_DISTINGUISHED_NAME: &str = "distinguishedName";
pub const ATTR_USER_ACCOUNT_CONTROL: &str = "userAccountControl";

const UAC_ACCOUNT_DISABLE: u32 = 0x0002;
const UAC_DONT_EXPIRE_PASSWORD: u32 = 0x1_0000;

/// A statically known attribute of an entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDef {
	pub name: &'static str,
	pub description: &'static str,
}

/// What makes an entry a user, group or computer.
pub trait EntryKind: Sized + Send + Sync {
	const NAME: &'static str;

	/// Predicate every persisted entry of this kind satisfies.
	fn type_filter() -> Option<Filter>;

	/// Attributes merged into every create request for this kind.
	fn required_attributes() -> Attributes;

	/// Attributes the caller must supply when creating an entry of this kind.
	fn mandatory_attributes() -> &'static [&'static str] {
		&[]
	}

	fn from_entry(entry: Entry) -> Self;

	fn entry(&self) -> &Entry;

	fn entry_mut(&mut self) -> &mut Entry;

	fn into_entry(self) -> Entry;

	/// Drops derived state computed from a previous load.
	fn invalidate(&mut self) {}

	fn from_raw(raw: RawEntry) -> Self {
		Self::from_entry(Entry::from_raw(raw))
	}
}

impl EntryKind for Entry {
	const NAME: &'static str = "entry";

	fn type_filter() -> Option<Filter> {
		None
	}

	fn required_attributes() -> Attributes {
		Attributes::new()
	}

	fn from_entry(entry: Entry) -> Self {
		entry
	}

	fn entry(&self) -> &Entry {
		self
	}

	fn entry_mut(&mut self) -> &mut Entry {
		self
	}

	fn into_entry(self) -> Entry {
		self
	}
}

fn object_classes(classes: &[&str]) -> Attributes {
	let mut attrs = Attributes::new();
	attrs.insert(ATTR_OBJECT_CLASS, classes.iter().copied());
	attrs
}

/// Generates typed getters/setters and the `ATTRIBUTES` table for a kind.
macro_rules! define_attributes {
	($kind:ident { $($getter:ident, $setter:ident => $attr:literal, $doc:literal;)* }) => {
		impl $kind {
			pub const ATTRIBUTES: &'static [AttributeDef] = &[
				$(AttributeDef { name: $attr, description: $doc },)*
			];

			$(
				#[doc = $doc]
				pub fn $getter(&self) -> Option<&str> {
					self.entry().first_value($attr)
				}

				#[doc = concat!("Stages a new `", $attr, "`.")]
				pub fn $setter(&mut self, value: impl Into<String>) {
					self.entry_mut().set_attribute($attr, [value.into()]);
				}
			)*
		}
	};
}

macro_rules! impl_entry_deref {
	($kind:ident) => {
		impl Deref for $kind {
			type Target = Entry;

			fn deref(&self) -> &Entry {
				self.entry()
			}
		}

		impl PartialEq for $kind {
			fn eq(&self, other: &Self) -> bool {
				self.entry() == other.entry()
			}
		}

		impl Eq for $kind {}
	};
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone)]
pub struct User {
	entry: Entry,
}

impl EntryKind for User {
	const NAME: &'static str = "user";

	fn type_filter() -> Option<Filter> {
		Some(
			Filter::equals(ATTR_OBJECT_CLASS, "user")
				.and(Filter::equals(ATTR_OBJECT_CLASS, "computer").negate()),
		)
	}

	fn required_attributes() -> Attributes {
		object_classes(&["top", "person", "organizationalPerson", "user"])
	}

	fn mandatory_attributes() -> &'static [&'static str] {
		&["sAMAccountName"]
	}

	fn from_entry(entry: Entry) -> Self {
		Self { entry }
	}

	fn entry(&self) -> &Entry {
		&self.entry
	}

	fn entry_mut(&mut self) -> &mut Entry {
		&mut self.entry
	}

	fn into_entry(self) -> Entry {
		self.entry
	}
}

define_attributes!(User {
	common_name, set_common_name => "cn", "Common name.";
	display_name, set_display_name => "displayName", "Display name.";
	given_name, set_given_name => "givenName", "Given (first) name.";
	surname, set_surname => "sn", "Surname.";
	mail, set_mail => "mail", "Primary email address.";
	sam_account_name, set_sam_account_name => "sAMAccountName", "Pre-Windows 2000 logon name.";
	user_principal_name, set_user_principal_name => "userPrincipalName", "Logon name in user@domain form.";
	description, set_description => "description", "Free-form description.";
	department, set_department => "department", "Department.";
	title, set_title => "title", "Job title.";
	telephone_number, set_telephone_number => "telephoneNumber", "Primary telephone number.";
});

impl_entry_deref!(User);

impl User {
	fn account_control(&self) -> Option<u32> {
		self.entry
			.first_value(ATTR_USER_ACCOUNT_CONTROL)
			.and_then(|v| v.trim().parse().ok())
	}

	pub fn is_disabled(&self) -> bool {
		self.account_control()
			.map(|uac| uac & UAC_ACCOUNT_DISABLE != 0)
			.unwrap_or(false)
	}

	pub fn password_never_expires(&self) -> bool {
		self.account_control()
			.map(|uac| uac & UAC_DONT_EXPIRE_PASSWORD != 0)
			.unwrap_or(false)
	}

	/// Replicated last logon time; `None` when never logged on.
	pub fn last_logon(&self) -> Option<DateTime<Utc>> {
		self.entry
			.first_value("lastLogonTimestamp")
			.and_then(|v| codec::decode_file_time(v).ok().flatten())
	}

	pub fn account_expires(&self) -> Option<DateTime<Utc>> {
		self.entry
			.first_value("accountExpires")
			.and_then(|v| codec::decode_file_time(v).ok().flatten())
	}

	pub fn password_last_set(&self) -> Option<DateTime<Utc>> {
		self.entry
			.first_value("pwdLastSet")
			.and_then(|v| codec::decode_file_time(v).ok().flatten())
	}

	/// Names of the groups listing this user, as reported by the directory.
	pub fn member_of(&self) -> &[String] {
		self.entry.attribute(ATTR_MEMBER_OF).unwrap_or(&[])
	}
}

// =============================================================================
// Group
// =============================================================================

#[derive(Debug, Clone)]
pub struct Group {
	entry: Entry,
	cache: MembershipCache,
}

impl EntryKind for Group {
	const NAME: &'static str = "group";

	fn type_filter() -> Option<Filter> {
		Some(Filter::equals(ATTR_OBJECT_CLASS, "group"))
	}

	fn required_attributes() -> Attributes {
		object_classes(&["top", "group"])
	}

	fn mandatory_attributes() -> &'static [&'static str] {
		&["sAMAccountName"]
	}

	fn from_entry(entry: Entry) -> Self {
		Self {
			entry,
			cache: MembershipCache::default(),
		}
	}

	fn entry(&self) -> &Entry {
		&self.entry
	}

	fn entry_mut(&mut self) -> &mut Entry {
		&mut self.entry
	}

	fn into_entry(self) -> Entry {
		self.entry
	}

	fn invalidate(&mut self) {
		self.cache.clear();
	}
}

define_attributes!(Group {
	common_name, set_common_name => "cn", "Common name.";
	display_name, set_display_name => "displayName", "Display name.";
	description, set_description => "description", "Free-form description.";
	mail, set_mail => "mail", "Distribution address.";
	sam_account_name, set_sam_account_name => "sAMAccountName", "Pre-Windows 2000 group name.";
	managed_by, set_managed_by => "managedBy", "Name of the managing entry.";
});

impl_entry_deref!(Group);

impl Group {
	/// Names listed in `member` as of the last load, in directory order.
	/// Staged `member` edits are not visible here until saved, which keeps
	/// these names in step with [`Group::cache`].
	pub fn member_dns(&self) -> &[String] {
		self.entry
			.loaded()
			.and_then(|attrs| attrs.get(ATTR_MEMBER))
			.unwrap_or(&[])
	}

	pub fn has_member_dn(&self, dn: &str) -> bool {
		self.member_dns().iter().any(|m| m.eq_ignore_ascii_case(dn))
	}

	pub fn member_of(&self) -> &[String] {
		self.entry.attribute(ATTR_MEMBER_OF).unwrap_or(&[])
	}

	/// Memoized membership for the current load generation.
	pub fn cache(&mut self) -> &mut MembershipCache {
		self.cache.sync_generation(self.entry.generation());
		&mut self.cache
	}
}

// =============================================================================
// Computer
// =============================================================================

#[derive(Debug, Clone)]
pub struct Computer {
	entry: Entry,
}

impl EntryKind for Computer {
	const NAME: &'static str = "computer";

	fn type_filter() -> Option<Filter> {
		Some(Filter::equals(ATTR_OBJECT_CLASS, "computer"))
	}

	fn required_attributes() -> Attributes {
		object_classes(&["top", "person", "organizationalPerson", "user", "computer"])
	}

	fn mandatory_attributes() -> &'static [&'static str] {
		&["sAMAccountName"]
	}

	fn from_entry(entry: Entry) -> Self {
		Self { entry }
	}

	fn entry(&self) -> &Entry {
		&self.entry
	}

	fn entry_mut(&mut self) -> &mut Entry {
		&mut self.entry
	}

	fn into_entry(self) -> Entry {
		self.entry
	}
}

define_attributes!(Computer {
	common_name, set_common_name => "cn", "Common name.";
	hostname, set_hostname => "dNSHostName", "Fully qualified host name.";
	operating_system, set_operating_system => "operatingSystem", "Operating system name.";
	operating_system_version, set_operating_system_version => "operatingSystemVersion", "Operating system version.";
	description, set_description => "description", "Free-form description.";
});

impl_entry_deref!(Computer);

#[cfg(test)]
mod tests {
	use super::*;

	fn user_with(attrs: &[(&str, &str)]) -> User {
		let attributes: Attributes = attrs.iter().map(|(k, v)| (*k, vec![*v])).collect();
		User::from_raw(RawEntry::new("cn=jdoe,dc=example,dc=org", attributes))
	}

	#[test]
	fn test_type_filters_render() {
		assert_eq!(
			User::type_filter().unwrap().render(),
			"(&(objectClass=user)(!(objectClass=computer)))"
		);
		assert_eq!(Group::type_filter().unwrap().render(), "(objectClass=group)");
		assert_eq!(
			Computer::type_filter().unwrap().render(),
			"(objectClass=computer)"
		);
		assert!(Entry::type_filter().is_none());
	}

	#[test]
	fn test_required_object_classes() {
		let required = Group::required_attributes();
		assert_eq!(
			required.get("objectclass").unwrap(),
			&["top".to_string(), "group".to_string()]
		);
	}

	#[test]
	fn test_typed_accessors() {
		let mut user = user_with(&[("sAMAccountName", "jdoe"), ("mail", "jdoe@example.org")]);
		assert_eq!(user.sam_account_name(), Some("jdoe"));
		assert_eq!(user.mail(), Some("jdoe@example.org"));
		assert_eq!(user.title(), None);

		user.set_title("Engineer");
		assert_eq!(user.title(), Some("Engineer"));
		assert!(user.is_dirty());
	}

	#[test]
	fn test_attribute_table_lists_accessors() {
		assert!(User::ATTRIBUTES.iter().any(|a| a.name == "sAMAccountName"));
		assert!(Computer::ATTRIBUTES.iter().any(|a| a.name == "dNSHostName"));
	}

	#[test]
	fn test_account_control_flags() {
		let disabled = user_with(&[("userAccountControl", "514")]);
		assert!(disabled.is_disabled());
		assert!(!disabled.password_never_expires());

		let enabled = user_with(&[("userAccountControl", "66048")]);
		assert!(!enabled.is_disabled());
		assert!(enabled.password_never_expires());

		assert!(!user_with(&[]).is_disabled());
	}

	#[test]
	fn test_last_logon_decodes_file_time() {
		let user = user_with(&[("lastLogonTimestamp", "116444736000000000")]);
		assert_eq!(user.last_logon().unwrap().timestamp(), 0);
		assert!(user_with(&[("lastLogonTimestamp", "0")]).last_logon().is_none());
	}

	#[test]
	fn test_group_members_and_cache_generation() {
		let mut attrs = Attributes::new();
		attrs.insert("member", ["cn=a,dc=example", "cn=b,dc=example"]);
		let mut group = Group::from_raw(RawEntry::new("cn=g,dc=example", attrs.clone()));
		assert!(group.has_member_dn("CN=A,DC=EXAMPLE"));
		assert!(!group.has_member_dn("cn=c,dc=example"));

		group.cache().direct_users = Some(Default::default());
		assert!(!group.cache().is_empty());

		group.entry_mut().load(RawEntry::new("cn=g,dc=example", attrs));
		assert!(group.cache().is_empty());
	}

	#[test]
	fn test_member_dns_ignore_staged_member_edits() {
		let mut attrs = Attributes::new();
		attrs.insert("member", ["cn=a,dc=example"]);
		let mut group = Group::from_raw(RawEntry::new("cn=g,dc=example", attrs));
		group.cache().direct_users = Some(Default::default());

		group
			.entry_mut()
			.set_attribute("member", ["cn=a,dc=example", "cn=b,dc=example"]);
		assert_eq!(group.member_dns(), ["cn=a,dc=example".to_string()]);
		assert!(!group.has_member_dn("cn=b,dc=example"));
		assert_eq!(group.attribute("member").map(<[String]>::len), Some(2));
		assert!(!group.cache().is_empty());
	}

	#[test]
	fn test_invalidate_clears_cache() {
		let mut group = Group::from_raw(RawEntry::new("cn=g,dc=example", Attributes::new()));
		group.cache().transitive_groups = Some(Default::default());
		group.invalidate();
		assert!(group.cache().is_empty());
	}

	#[test]
	fn test_typed_equality_follows_dn() {
		let a = Group::from_entry(Entry::new("cn=g,dc=example"));
		let b = Group::from_raw(RawEntry::new("cn=g,dc=example", Attributes::new()));
		assert_eq!(a, b);
	}
}
