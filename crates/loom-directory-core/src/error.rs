// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller errors, raised before any request reaches the directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("distinguished name must not be empty")]
	EmptyDn,

	#[error("invalid distinguished name '{dn}': {reason}")]
	InvalidDn { dn: String, reason: String },

	#[error("required attribute '{0}' is missing")]
	MissingAttribute(String),

	#[error("invalid finder request '{0}'")]
	InvalidFinder(String),

	#[error("finder expects {expected} argument(s), got {actual}")]
	ArgumentCount { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
	Connect,
	Bind,
	Search,
	Add,
	Modify,
	Delete,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Connect => "connect",
			Self::Bind => "bind",
			Self::Search => "search",
			Self::Add => "add",
			Self::Modify => "modify",
			Self::Delete => "delete",
		};
		f.write_str(name)
	}
}

/// A failure reported by the protocol collaborator.
///
/// Carries the operation and identity involved so callers can decide whether
/// to retry; nothing in this workspace retries on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
	pub operation: Operation,
	pub dn: String,
	pub code: Option<u32>,
	pub message: String,
}

impl ProtocolError {
	pub fn new(operation: Operation, dn: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			operation,
			dn: dn.into(),
			code: None,
			message: message.into(),
		}
	}

	pub fn with_code(mut self, code: u32) -> Self {
		self.code = Some(code);
		self
	}

	/// Whether the failure looks transient (busy, unavailable, timed out or
	/// a transport error without a result code).
	pub fn is_retryable(&self) -> bool {
		match self.code {
			// timeLimitExceeded, busy, unavailable, serverDown, timeout
			Some(code) => matches!(code, 3 | 51 | 52 | 81 | 85),
			None => matches!(self.operation, Operation::Connect),
		}
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} failed for '{}'", self.operation, self.dn)?;
		if let Some(code) = self.code {
			write!(f, " (code {code})")?;
		}
		write!(f, ": {}", self.message)
	}
}

impl std::error::Error for ProtocolError {}

#[derive(Debug, Error)]
pub enum DirectoryError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("invalid filter: {0}")]
	InvalidFilter(String),

	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	#[error("entry does not exist in the directory: {0}")]
	NotPersisted(String),

	#[error("entry not found: {0}")]
	NotFound(String),
}

pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;
