// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory entry model for Loom.
//!
//! This crate has no I/O. It provides:
//! - [`Filter`]: search predicates, their RFC 4515 rendering, parsing and
//!   in-memory evaluation
//! - [`Entry`] and the typed kinds [`User`], [`Group`], [`Computer`]
//! - [`FinderRequest`]: "find all by a and b" request parsing
//! - [`Container`]: hierarchical names
//! - [`codec`]: timestamp and password attribute codecs

pub mod attributes;
pub mod codec;
pub mod dn;
pub mod entry;
pub mod error;
pub mod filter;
pub mod finder;
pub mod kind;
pub mod membership;
pub mod modification;

pub use attributes::{Attributes, RawEntry};
pub use dn::{validate_dn, ComponentKind, Container};
pub use entry::Entry;
pub use error::{DirectoryError, Operation, ProtocolError, Result, ValidationError};
pub use filter::{evaluate_filter, Filter, FilterParser};
pub use finder::{Cardinality, FinderRequest};
pub use kind::{AttributeDef, Computer, EntryKind, Group, User};
pub use membership::{Membership, MembershipCache};
pub use modification::{Modification, ModificationKind};
