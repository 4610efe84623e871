// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::ast::Filter;

/// Evaluates `filter` against an entry whose values are produced by
/// `get_attr`. Names and values compare case-insensitively and `*` inside an
/// equality value matches any run of characters.
pub fn evaluate_filter<'a, F>(filter: &Filter, get_attr: &F) -> bool
where
	F: Fn(&str) -> Option<&'a [String]>,
{
	match filter {
		Filter::Equals { attribute, value } => get_attr(attribute)
			.map(|values| values.iter().any(|v| wildcard_match(value, v)))
			.unwrap_or(false),
		Filter::Present { attribute } => get_attr(attribute)
			.map(|values| !values.is_empty())
			.unwrap_or(false),
		Filter::And(left, right) => evaluate_filter(left, get_attr) && evaluate_filter(right, get_attr),
		Filter::Or(left, right) => evaluate_filter(left, get_attr) || evaluate_filter(right, get_attr),
		Filter::Not(inner) => !evaluate_filter(inner, get_attr),
	}
}

fn wildcard_match(pattern: &str, candidate: &str) -> bool {
	let pattern = pattern.to_lowercase();
	let candidate = candidate.to_lowercase();

	if !pattern.contains('*') {
		return pattern == candidate;
	}

	let parts: Vec<&str> = pattern.split('*').collect();
	let mut rest = candidate.as_str();

	let first = parts[0];
	if !rest.starts_with(first) {
		return false;
	}
	rest = &rest[first.len()..];

	let last = parts[parts.len() - 1];
	for part in &parts[1..parts.len() - 1] {
		match rest.find(part) {
			Some(idx) => rest = &rest[idx + part.len()..],
			None => return false,
		}
	}

	rest.len() >= last.len() && rest.ends_with(last)
}
