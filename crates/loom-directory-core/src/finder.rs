// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Translates "find all by sAMAccountName and mail" style requests into a
//! cardinality and an equality filter.

use std::fmt::Display;

use winnow::ascii::{space1, Caseless};
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::error::{DirectoryError, ValidationError};
use crate::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
	/// At most one result.
	First,
	/// Every result, in directory order.
	All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinderRequest {
	pub cardinality: Cardinality,
	pub attributes: Vec<String>,
	pub filter: Filter,
}

impl FinderRequest {
	/// Parses `request` and pairs its attribute names with `args` in order.
	///
	/// Accepts `find first by a and b` as well as `find_first_by_a_and_b`.
	pub fn parse<I, V>(request: &str, args: I) -> Result<Self, DirectoryError>
	where
		I: IntoIterator<Item = V>,
		V: Display,
	{
		let (cardinality, attributes) = parse_request
			.parse(request.trim())
			.map_err(|_| ValidationError::InvalidFinder(request.to_string()))?;

		let args: Vec<String> = args.into_iter().map(|a| a.to_string()).collect();
		if args.len() != attributes.len() {
			return Err(ValidationError::ArgumentCount {
				expected: attributes.len(),
				actual: args.len(),
			}
			.into());
		}

		let filter = Filter::from_pairs(attributes.iter().cloned().zip(args))
			.ok_or_else(|| ValidationError::InvalidFinder(request.to_string()))?;

		Ok(Self {
			cardinality,
			attributes,
			filter,
		})
	}
}

fn parse_request(input: &mut &str) -> Result<(Cardinality, Vec<String>), ContextError> {
	let _ = Caseless("find").parse_next(input)?;
	separator(input)?;
	let cardinality = alt((
		Caseless("first").map(|_| Cardinality::First),
		Caseless("all").map(|_| Cardinality::All),
	))
	.parse_next(input)?;
	separator(input)?;
	let _ = Caseless("by").parse_next(input)?;
	separator(input)?;

	let mut attributes = vec![parse_attribute(input)?];

	loop {
		let checkpoint = *input;
		if separator(input).is_err() {
			*input = checkpoint;
			break;
		}
		let and_result: Result<&str, ContextError> = Caseless("and").parse_next(input);
		if and_result.is_err() {
			*input = checkpoint;
			break;
		}
		separator(input)?;
		attributes.push(parse_attribute(input)?);
	}

	Ok((cardinality, attributes))
}

fn separator(input: &mut &str) -> Result<(), ContextError> {
	alt((space1, "_")).void().parse_next(input)
}

fn parse_attribute(input: &mut &str) -> Result<String, ContextError> {
	let name: &str = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-')
		.parse_next(input)?;
	Ok(name.to_string())
}
