// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hierarchical name containers (`cn=Users,dc=example,dc=org`).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
	Cn,
	Ou,
	Dc,
}

impl ComponentKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Cn => "cn",
			Self::Ou => "ou",
			Self::Dc => "dc",
		}
	}
}

impl FromStr for ComponentKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"cn" => Ok(Self::Cn),
			"ou" => Ok(Self::Ou),
			"dc" => Ok(Self::Dc),
			other => Err(format!("unsupported component kind '{other}'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
	pub kind: ComponentKind,
	pub name: String,
}

/// An ordered list of name components, innermost first and outermost last.
///
/// Equality and hashing use the lower-cased rendering, matching how
/// directories compare names.
#[derive(Debug, Clone, Default)]
pub struct Container {
	components: Vec<Component>,
}

impl Container {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_components<I, S>(components: I) -> Self
	where
		I: IntoIterator<Item = (ComponentKind, S)>,
		S: Into<String>,
	{
		Self {
			components: components
				.into_iter()
				.map(|(kind, name)| Component {
					kind,
					name: name.into(),
				})
				.collect(),
		}
	}

	/// Appends a component outside the ones already present.
	pub fn push(mut self, kind: ComponentKind, name: impl Into<String>) -> Self {
		self.components.push(Component {
			kind,
			name: name.into(),
		});
		self
	}

	pub fn cn(self, name: impl Into<String>) -> Self {
		self.push(ComponentKind::Cn, name)
	}

	pub fn ou(self, name: impl Into<String>) -> Self {
		self.push(ComponentKind::Ou, name)
	}

	pub fn dc(self, name: impl Into<String>) -> Self {
		self.push(ComponentKind::Dc, name)
	}

	/// Places `self` beneath `parent`.
	pub fn with_parent(&self, parent: &Container) -> Self {
		let mut components = self.components.clone();
		components.extend(parent.components.iter().cloned());
		Self { components }
	}

	/// The container without its innermost component.
	pub fn parent(&self) -> Option<Self> {
		if self.components.is_empty() {
			return None;
		}
		Some(Self {
			components: self.components[1..].to_vec(),
		})
	}

	pub fn components(&self) -> &[Component] {
		&self.components
	}

	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	pub fn render(&self) -> String {
		self.components
			.iter()
			.map(|c| format!("{}={}", c.kind.as_str(), escape_dn_value(&c.name)))
			.collect::<Vec<_>>()
			.join(",")
	}

	/// Parses `kind=name` pairs separated by unescaped commas.
	pub fn parse(dn: &str) -> Result<Self, ValidationError> {
		let invalid = |reason: String| ValidationError::InvalidDn {
			dn: dn.to_string(),
			reason,
		};

		if dn.trim().is_empty() {
			return Ok(Self::new());
		}

		let mut components = Vec::new();
		for raw in split_unescaped(dn, ',') {
			let (kind, name) = raw
				.split_once('=')
				.ok_or_else(|| invalid(format!("component '{raw}' has no '='")))?;
			let kind: ComponentKind = kind.parse().map_err(invalid)?;
			let name = unescape_dn_value(name.trim());
			if name.is_empty() {
				return Err(invalid("empty component value".to_string()));
			}
			components.push(Component { kind, name });
		}
		Ok(Self { components })
	}
}

impl fmt::Display for Container {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.render())
	}
}

impl PartialEq for Container {
	fn eq(&self, other: &Self) -> bool {
		self.render().to_lowercase() == other.render().to_lowercase()
	}
}

impl Eq for Container {}

impl Hash for Container {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.render().to_lowercase().hash(state);
	}
}

impl FromStr for Container {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Joins a caller-supplied sub-scope onto the configured base.
pub fn scope_under(sub: Option<&Container>, base: &str) -> String {
	match sub {
		Some(sub) if !sub.is_empty() && base.is_empty() => sub.render(),
		Some(sub) if !sub.is_empty() => format!("{},{}", sub.render(), base),
		_ => base.to_string(),
	}
}

/// Escapes a component value per RFC 4514.
pub fn escape_dn_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let last = value.chars().count().saturating_sub(1);
	for (i, ch) in value.chars().enumerate() {
		match ch {
			',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
				out.push('\\');
				out.push(ch);
			}
			'\0' => out.push_str("\\00"),
			' ' if i == 0 || i == last => out.push_str("\\20"),
			'#' if i == 0 => out.push_str("\\23"),
			_ => out.push(ch),
		}
	}
	out
}

/// Checks that `dn` is a well-formed RFC 4514 name of any attribute types,
/// such as `o=Example,c=US`. [`Container::parse`] is narrower and only
/// accepts `cn`, `ou` and `dc`.
pub fn validate_dn(dn: &str) -> Result<(), ValidationError> {
	let invalid = |reason: String| ValidationError::InvalidDn {
		dn: dn.to_string(),
		reason,
	};

	if dn.trim().is_empty() {
		return Err(invalid("name is empty".to_string()));
	}
	for rdn in split_unescaped(dn, ',') {
		// multi-valued components are joined with an unescaped '+'
		for raw in split_unescaped(rdn, '+') {
			let (kind, value) = raw
				.split_once('=')
				.ok_or_else(|| invalid(format!("component '{raw}' has no '='")))?;
			if !is_attribute_type(kind.trim()) {
				return Err(invalid(format!("invalid attribute type '{}'", kind.trim())));
			}
			if unescape_dn_value(value.trim()).is_empty() {
				return Err(invalid("empty component value".to_string()));
			}
		}
	}
	Ok(())
}

/// A descriptor (`cn`, `msDS-Foo`) or a numeric OID (`2.5.4.3`).
fn is_attribute_type(kind: &str) -> bool {
	let mut chars = kind.chars();
	match chars.next() {
		Some(first) if first.is_ascii_alphabetic() => {
			chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
		}
		Some(first) if first.is_ascii_digit() => {
			kind.split('.')
				.all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
		}
		_ => false,
	}
}

/// Decodes RFC 4514 escapes. `\XX` pairs are collected as raw bytes, so
/// multi-byte UTF-8 sequences such as `\C3\A9` decode to one character.
fn unescape_dn_value(value: &str) -> String {
	let mut bytes = Vec::with_capacity(value.len());
	let mut rest = value.as_bytes();
	while let Some((&b, tail)) = rest.split_first() {
		if b != b'\\' {
			bytes.push(b);
			rest = tail;
			continue;
		}
		let hex = tail
			.get(..2)
			.and_then(|pair| std::str::from_utf8(pair).ok())
			.filter(|pair| pair.bytes().all(|c| c.is_ascii_hexdigit()))
			.and_then(|pair| u8::from_str_radix(pair, 16).ok());
		match hex {
			Some(byte) => {
				bytes.push(byte);
				rest = &tail[2..];
			}
			None => match tail.split_first() {
				Some((&escaped, after)) => {
					bytes.push(escaped);
					rest = after;
				}
				None => rest = tail,
			},
		}
	}
	match String::from_utf8(bytes) {
		Ok(decoded) => decoded,
		Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
	}
}

fn split_unescaped(dn: &str, separator: char) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut start = 0;
	let mut escaped = false;
	for (i, ch) in dn.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		if ch == '\\' {
			escaped = true;
		} else if ch == separator {
			parts.push(dn[start..i].trim());
			start = i + ch.len_utf8();
		}
	}
	parts.push(dn[start..].trim());
	parts
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn example_org() -> Container {
		Container::new().dc("example").dc("org")
	}

	#[test]
	fn test_render_with_parent() {
		let users = Container::new().ou("People").with_parent(&example_org());
		assert_eq!(users.render(), "ou=People,dc=example,dc=org");
	}

	#[test]
	fn test_equality_is_case_insensitive() {
		let a = Container::new().cn("Users").with_parent(&example_org());
		let b = Container::parse("CN=users,DC=Example,DC=ORG").unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn test_parse_escaped_comma() {
		let c = Container::parse("cn=Doe\\, John,ou=People,dc=example,dc=org").unwrap();
		assert_eq!(c.components().len(), 4);
		assert_eq!(c.components()[0].name, "Doe, John");
		assert_eq!(c.render(), "cn=Doe\\, John,ou=People,dc=example,dc=org");
	}

	#[test]
	fn test_parse_decodes_multi_byte_escapes() {
		let c = Container::parse("cn=Ren\\C3\\A9,dc=example").unwrap();
		assert_eq!(c.components()[0].name, "René");
		let c = Container::parse("cn=\\4a\\44oe,dc=example").unwrap();
		assert_eq!(c.components()[0].name, "JDoe");
		let c = Container::parse("cn=a\\\\41,dc=example").unwrap();
		assert_eq!(c.components()[0].name, "a\\41");
	}

	#[test]
	fn test_validate_dn_accepts_any_attribute_type() {
		assert!(validate_dn("o=Example,c=US").is_ok());
		assert!(validate_dn("uid=jdoe+cn=John Doe,2.5.4.10=Example").is_ok());
		assert!(validate_dn("cn=Doe\\, John,dc=example").is_ok());
		assert!(validate_dn("cn=A\\+B,dc=example").is_ok());
	}

	#[test]
	fn test_validate_dn_rejects_malformed_names() {
		for dn in ["", "example.org", "dc=example,,dc=org", "=x,dc=org", "dc=,dc=org", "1x=a"] {
			assert!(
				matches!(validate_dn(dn), Err(ValidationError::InvalidDn { .. })),
				"{dn:?} should be rejected"
			);
		}
	}

	#[test]
	fn test_parse_rejects_unknown_kind() {
		let err = Container::parse("uid=jdoe,dc=example").unwrap_err();
		assert!(matches!(err, ValidationError::InvalidDn { .. }));
	}

	#[test]
	fn test_parent() {
		let c = Container::parse("cn=jdoe,ou=People,dc=example,dc=org").unwrap();
		assert_eq!(c.parent().unwrap().render(), "ou=People,dc=example,dc=org");
		assert!(Container::new().parent().is_none());
	}

	#[test]
	fn test_scope_under() {
		let sub = Container::new().ou("People");
		assert_eq!(
			scope_under(Some(&sub), "dc=example,dc=org"),
			"ou=People,dc=example,dc=org"
		);
		assert_eq!(scope_under(None, "dc=example,dc=org"), "dc=example,dc=org");
		assert_eq!(
			scope_under(Some(&Container::new()), "dc=example,dc=org"),
			"dc=example,dc=org"
		);
	}

	fn component() -> impl Strategy<Value = (ComponentKind, String)> {
		(
			prop_oneof![
				Just(ComponentKind::Cn),
				Just(ComponentKind::Ou),
				Just(ComponentKind::Dc)
			],
			"[A-Za-z][A-Za-z0-9]{0,10}",
		)
	}

	proptest! {
		/// **Property: Rendering parent-then-child matches manual joining**
		///
		/// Invariant: child.with_parent(parent).render() ==
		/// join("kind=name") over child components followed by parent components.
		#[test]
		fn test_render_matches_manual_join(
			child in prop::collection::vec(component(), 1..4),
			parent in prop::collection::vec(component(), 1..4),
		) {
			let container = Container::from_components(child.clone())
				.with_parent(&Container::from_components(parent.clone()));
			let manual = child
				.iter()
				.chain(parent.iter())
				.map(|(k, n)| format!("{}={}", k.as_str(), n))
				.collect::<Vec<_>>()
				.join(",");
			prop_assert_eq!(container.render(), manual);
		}

		/// **Property: Container equality ignores case**
		///
		/// Invariant: a container equals its upper-cased re-parse.
		#[test]
		fn test_equality_ignores_case(parts in prop::collection::vec(component(), 1..5)) {
			let container = Container::from_components(parts);
			let shouted = Container::parse(&container.render().to_uppercase()).unwrap();
			prop_assert_eq!(container, shouted);
		}
	}
}
