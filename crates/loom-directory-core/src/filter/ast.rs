// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::{self, Display, Write};
use std::ops::{BitAnd, BitOr, Not};

/// A directory search predicate.
///
/// Filters are immutable: every combinator consumes its operands and returns a
/// new tree. Conjunction and disjunction keep operand order, so
/// `a.and(b)` and `b.and(a)` match the same entries but render differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
	Equals { attribute: String, value: String },
	Present { attribute: String },
	And(Box<Filter>, Box<Filter>),
	Or(Box<Filter>, Box<Filter>),
	Not(Box<Filter>),
}

impl Filter {
	/// Equality on the textual form of `value`. A `*` in the value is kept
	/// as-is and acts as a wildcard.
	pub fn equals(attribute: impl Into<String>, value: impl Display) -> Self {
		Self::Equals {
			attribute: attribute.into(),
			value: value.to_string(),
		}
	}

	pub fn present(attribute: impl Into<String>) -> Self {
		Self::Present {
			attribute: attribute.into(),
		}
	}

	pub fn and(self, other: Filter) -> Self {
		Self::And(Box::new(self), Box::new(other))
	}

	pub fn or(self, other: Filter) -> Self {
		Self::Or(Box::new(self), Box::new(other))
	}

	pub fn negate(self) -> Self {
		Self::Not(Box::new(self))
	}

	/// Left-associated conjunction of equalities, in the iteration order of
	/// `pairs`. Returns `None` for an empty input.
	pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Display,
	{
		Self::all(pairs.into_iter().map(|(k, v)| Self::equals(k, v)))
	}

	/// Left fold with `and`.
	pub fn all<I: IntoIterator<Item = Filter>>(filters: I) -> Option<Self> {
		filters.into_iter().reduce(Filter::and)
	}

	/// Left fold with `or`.
	pub fn any<I: IntoIterator<Item = Filter>>(filters: I) -> Option<Self> {
		filters.into_iter().reduce(Filter::or)
	}

	/// RFC 4515 text for this filter.
	pub fn render(&self) -> String {
		let mut out = String::new();
		self.write_to(&mut out);
		out
	}

	fn write_to(&self, out: &mut String) {
		match self {
			Filter::Equals { attribute, value } => {
				let _ = write!(out, "({attribute}={})", escape_value(value));
			}
			Filter::Present { attribute } => {
				let _ = write!(out, "({attribute}=*)");
			}
			Filter::And(left, right) => {
				out.push_str("(&");
				left.write_to(out);
				right.write_to(out);
				out.push(')');
			}
			Filter::Or(left, right) => {
				out.push_str("(|");
				left.write_to(out);
				right.write_to(out);
				out.push(')');
			}
			Filter::Not(inner) => {
				out.push_str("(!");
				inner.write_to(out);
				out.push(')');
			}
		}
	}
}

impl Display for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.render())
	}
}

impl BitAnd for Filter {
	type Output = Filter;

	fn bitand(self, rhs: Filter) -> Filter {
		self.and(rhs)
	}
}

impl BitOr for Filter {
	type Output = Filter;

	fn bitor(self, rhs: Filter) -> Filter {
		self.or(rhs)
	}
}

impl Not for Filter {
	type Output = Filter;

	fn not(self) -> Filter {
		self.negate()
	}
}

/// Escapes `\`, `(`, `)` and NUL in an assertion value. `*` is left alone so
/// wildcard values pass through.
pub fn escape_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for ch in value.chars() {
		match ch {
			'\\' => out.push_str("\\5c"),
			'(' => out.push_str("\\28"),
			')' => out.push_str("\\29"),
			'\0' => out.push_str("\\00"),
			_ => out.push(ch),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_render_equals_and_present() {
		assert_eq!(Filter::equals("cn", "jdoe").render(), "(cn=jdoe)");
		assert_eq!(Filter::present("mail").render(), "(mail=*)");
	}

	#[test]
	fn test_render_composites() {
		let f = Filter::equals("objectClass", "user") & !Filter::equals("objectClass", "computer");
		assert_eq!(f.render(), "(&(objectClass=user)(!(objectClass=computer)))");

		let g = Filter::equals("cn", "a") | Filter::equals("cn", "b");
		assert_eq!(g.render(), "(|(cn=a)(cn=b))");
	}

	#[test]
	fn test_values_compare_as_text() {
		assert_eq!(Filter::equals("uidNumber", 1001).render(), "(uidNumber=1001)");
		assert_eq!(Filter::equals("active", true).render(), "(active=true)");
	}

	#[test]
	fn test_wildcard_passes_through_but_parens_escape() {
		assert_eq!(Filter::equals("cn", "jd*").render(), "(cn=jd*)");
		assert_eq!(
			Filter::equals("cn", "a(b)\\c").render(),
			"(cn=a\\28b\\29\\5cc)"
		);
	}

	#[test]
	fn test_from_pairs_empty_is_none() {
		let pairs: Vec<(&str, &str)> = Vec::new();
		assert!(Filter::from_pairs(pairs).is_none());
	}

	#[test]
	fn test_and_is_not_commutative_in_rendering() {
		let a = Filter::equals("a", "1");
		let b = Filter::equals("b", "2");
		assert_ne!(a.clone().and(b.clone()).render(), b.and(a).render());
	}

	fn attr_name() -> impl Strategy<Value = String> {
		"[a-zA-Z][a-zA-Z0-9-]{0,12}"
	}

	proptest! {
		/// **Property: Equality conjunctions render in pair order**
		///
		/// Invariant: from_pairs(p) renders each (k=v) in the order the pairs
		/// were supplied, nested left-to-right.
		#[test]
		fn test_from_pairs_preserves_order(
			pairs in prop::collection::vec((attr_name(), "[a-z0-9@.]{1,10}"), 1..6)
		) {
			let filter = Filter::from_pairs(pairs.clone()).unwrap();
			let mut expected = format!("({}={})", pairs[0].0, pairs[0].1);
			for (k, v) in &pairs[1..] {
				expected = format!("(&{expected}({k}={v}))");
			}
			prop_assert_eq!(filter.render(), expected);
		}

		/// **Property: And renders as the textual concatenation of its operands**
		///
		/// Invariant: And(f1, f2).render() == "(&" + f1.render() + f2.render() + ")"
		#[test]
		fn test_and_render_concatenates(a in attr_name(), b in attr_name(), v in "[a-z]{1,8}") {
			let f1 = Filter::equals(a, &v);
			let f2 = Filter::present(b);
			let combined = f1.clone().and(f2.clone());
			prop_assert_eq!(combined.render(), format!("(&{}{})", f1.render(), f2.render()));
		}
	}
}
