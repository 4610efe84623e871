// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use super::ast::Filter;
use crate::error::DirectoryError;
use winnow::combinator::repeat;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

/// Parser for RFC 4515 filter text.
///
/// Only the operators [`Filter`] can represent are accepted: `&`, `|`, `!`,
/// equality and presence. `&`/`|` lists with more than two operands are
/// folded left, so `(&(a=1)(b=2)(c=3))` parses to the same tree as
/// `a.and(b).and(c)`.
pub struct FilterParser;

impl FilterParser {
	pub fn parse(input: &str) -> Result<Filter, DirectoryError> {
		parse_filter
			.parse(input.trim())
			.map_err(|e| DirectoryError::InvalidFilter(format!("{:?}", e)))
	}
}

fn parse_filter(input: &mut &str) -> Result<Filter, ContextError> {
	let _ = '('.parse_next(input)?;

	let filter = if input.starts_with('&') {
		let _ = '&'.parse_next(input)?;
		let operands = parse_list(input)?;
		Filter::all(operands).ok_or_else(ContextError::new)?
	} else if input.starts_with('|') {
		let _ = '|'.parse_next(input)?;
		let operands = parse_list(input)?;
		Filter::any(operands).ok_or_else(ContextError::new)?
	} else if input.starts_with('!') {
		let _ = '!'.parse_next(input)?;
		let inner = parse_filter(input)?;
		Filter::Not(Box::new(inner))
	} else {
		parse_item(input)?
	};

	let _ = ')'.parse_next(input)?;
	Ok(filter)
}

fn parse_list(input: &mut &str) -> Result<Vec<Filter>, ContextError> {
	repeat(1.., parse_filter).parse_next(input)
}

fn parse_item(input: &mut &str) -> Result<Filter, ContextError> {
	let attribute: &str = take_while(1.., is_attribute_char).parse_next(input)?;
	let _ = '='.parse_next(input)?;
	let raw: &str = take_while(0.., |c: char| c != ')' && c != '(').parse_next(input)?;

	if raw == "*" {
		return Ok(Filter::present(attribute));
	}

	let value = unescape(raw).ok_or_else(ContextError::new)?;
	Ok(Filter::Equals {
		attribute: attribute.to_string(),
		value,
	})
}

fn is_attribute_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == ';'
}

/// Decodes `\XX` hex escapes.
fn unescape(raw: &str) -> Option<String> {
	let mut bytes = Vec::with_capacity(raw.len());
	let mut rest = raw.as_bytes();
	while let Some((&b, tail)) = rest.split_first() {
		if b == b'\\' {
			let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
			bytes.push(u8::from_str_radix(hex, 16).ok()?);
			rest = &tail[2..];
		} else {
			bytes.push(b);
			rest = tail;
		}
	}
	String::from_utf8(bytes).ok()
}
