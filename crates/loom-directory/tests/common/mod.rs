// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::Arc;

use loom_directory::{Directory, DirectoryConfig, MemoryDirectory};
use loom_directory_core::Attributes;

pub const BASE: &str = "dc=example,dc=org";
pub const JDOE: &str = "cn=John Doe,ou=People,dc=example,dc=org";
pub const JROE: &str = "cn=Jane Roe,ou=People,dc=example,dc=org";
pub const WS01: &str = "cn=WS01,ou=Computers,dc=example,dc=org";
pub const ADMINS: &str = "cn=Admins,ou=Groups,dc=example,dc=org";
pub const OPS: &str = "cn=Ops,ou=Groups,dc=example,dc=org";

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
	pairs
		.iter()
		.map(|(name, values)| (*name, values.iter().copied().collect::<Vec<_>>()))
		.collect()
}

pub fn user_attrs(sam: &str, mail: &str) -> Attributes {
	attrs(&[
		("objectClass", &["top", "person", "organizationalPerson", "user"]),
		("sAMAccountName", &[sam]),
		("mail", &[mail]),
	])
}

pub fn group_attrs(sam: &str, members: &[&str]) -> Attributes {
	let mut attributes = attrs(&[
		("objectClass", &["top", "group"]),
		("sAMAccountName", &[sam]),
	]);
	if !members.is_empty() {
		attributes.insert("member", members.iter().copied());
	}
	attributes
}

pub fn directory(memory: &Arc<MemoryDirectory>) -> Directory {
	init_tracing();
	Directory::new(memory.clone(), DirectoryConfig::new(BASE))
}

/// Two users, a computer, and two groups that list each other.
pub fn seeded() -> (Arc<MemoryDirectory>, Directory) {
	let memory = Arc::new(MemoryDirectory::new());
	memory.insert(JDOE, user_attrs("jdoe", "jdoe@example.org"));
	memory.insert(JROE, user_attrs("jroe", "jroe@example.org"));
	memory.insert(
		WS01,
		attrs(&[
			(
				"objectClass",
				&["top", "person", "organizationalPerson", "user", "computer"],
			),
			("sAMAccountName", &["WS01$"]),
			("dNSHostName", &["ws01.example.org"]),
		]),
	);
	memory.insert(ADMINS, group_attrs("admins", &[JDOE, OPS]));
	memory.insert(OPS, group_attrs("ops", &[JROE, ADMINS]));

	let directory = directory(&memory);
	(memory, directory)
}
