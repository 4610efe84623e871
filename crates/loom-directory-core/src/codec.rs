// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Codecs for directory-specific attribute formats.
//!
//! These are used by typed accessors only; the generic attribute path never
//! decodes values.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
	#[error("invalid generalized time '{0}'")]
	GeneralizedTime(String),

	#[error("invalid file time '{0}'")]
	FileTime(String),

	#[error("password must not be empty")]
	EmptyPassword,
}

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// Resolution of [`encode_generalized_time`].
pub const GENERALIZED_TIME_RESOLUTION_SECS: i64 = 1;

/// Renders `YYYYMMDDHHMMSS.0Z`.
pub fn encode_generalized_time(at: DateTime<Utc>) -> String {
	at.format("%Y%m%d%H%M%S.0Z").to_string()
}

/// Parses generalized time with or without a fraction, `Z` suffix required.
pub fn decode_generalized_time(value: &str) -> Result<DateTime<Utc>, CodecError> {
	let err = || CodecError::GeneralizedTime(value.to_string());
	let trimmed = value.strip_suffix('Z').ok_or_else(err)?;
	let whole = trimmed.split(['.', ',']).next().unwrap_or(trimmed);
	let naive = NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S").map_err(|_| err())?;
	Ok(Utc.from_utc_datetime(&naive))
}

/// Converts to 100ns ticks since 1601-01-01 UTC.
pub fn encode_file_time(at: DateTime<Utc>) -> i64 {
	let secs = at.timestamp() + FILETIME_EPOCH_OFFSET_SECS;
	secs * FILETIME_TICKS_PER_SEC + i64::from(at.timestamp_subsec_nanos() / 100)
}

/// Decodes 100ns ticks since 1601-01-01 UTC. `0` and `i64::MAX` are the
/// directory's "never" markers and decode to `None`.
pub fn decode_file_time(value: &str) -> Result<Option<DateTime<Utc>>, CodecError> {
	let ticks: i64 = value
		.trim()
		.parse()
		.map_err(|_| CodecError::FileTime(value.to_string()))?;
	if ticks <= 0 || ticks == i64::MAX {
		return Ok(None);
	}
	let secs = ticks / FILETIME_TICKS_PER_SEC - FILETIME_EPOCH_OFFSET_SECS;
	let nanos = (ticks % FILETIME_TICKS_PER_SEC) * 100;
	DateTime::from_timestamp(secs, nanos as u32)
		.map(Some)
		.ok_or_else(|| CodecError::FileTime(value.to_string()))
}

/// Encodes a password for the `unicodePwd` attribute: surrounded by double
/// quotes, UTF-16LE.
pub fn encode_unicode_pwd(password: &str) -> Result<Vec<u8>, CodecError> {
	if password.is_empty() {
		return Err(CodecError::EmptyPassword);
	}
	let quoted = format!("\"{password}\"");
	Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_generalized_time_known_value() {
		let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 30).unwrap();
		assert_eq!(encode_generalized_time(at), "20240309140530.0Z");
		assert_eq!(decode_generalized_time("20240309140530.0Z").unwrap(), at);
		assert_eq!(decode_generalized_time("20240309140530Z").unwrap(), at);
	}

	#[test]
	fn test_generalized_time_rejects_garbage() {
		assert!(decode_generalized_time("20240309140530").is_err());
		assert!(decode_generalized_time("yesterday Z").is_err());
	}

	#[test]
	fn test_file_time_never_markers() {
		assert_eq!(decode_file_time("0").unwrap(), None);
		assert_eq!(decode_file_time("9223372036854775807").unwrap(), None);
		assert!(decode_file_time("abc").is_err());
	}

	#[test]
	fn test_file_time_unix_epoch() {
		let epoch = DateTime::from_timestamp(0, 0).unwrap();
		assert_eq!(encode_file_time(epoch), 116_444_736_000_000_000);
		assert_eq!(
			decode_file_time("116444736000000000").unwrap(),
			Some(epoch)
		);
	}

	#[test]
	fn test_unicode_pwd() {
		let encoded = encode_unicode_pwd("Secret1").unwrap();
		let expected: Vec<u8> = "\"Secret1\""
			.encode_utf16()
			.flat_map(u16::to_le_bytes)
			.collect();
		assert_eq!(encoded, expected);
		assert_eq!(encoded[0], b'"');
		assert_eq!(encoded[1], 0);
		assert_eq!(encode_unicode_pwd(""), Err(CodecError::EmptyPassword));
	}

	proptest! {
		/// **Property: Generalized time round-trips within one second**
		///
		/// Invariant: |decode(encode(t)) - t| < GENERALIZED_TIME_RESOLUTION_SECS
		#[test]
		fn test_generalized_time_roundtrip(secs in 0i64..4_102_444_800, nanos in 0u32..1_000_000_000) {
			let at = DateTime::from_timestamp(secs, nanos).unwrap();
			let decoded = decode_generalized_time(&encode_generalized_time(at)).unwrap();
			let drift = (at - decoded).num_milliseconds().abs();
			prop_assert!(drift < GENERALIZED_TIME_RESOLUTION_SECS * 1000);
		}

		/// **Property: File time round-trips within 100ns**
		///
		/// Invariant: decode(encode(t)) == t truncated to 100ns ticks
		#[test]
		fn test_file_time_roundtrip(secs in 1i64..4_102_444_800, nanos in 0u32..1_000_000_000) {
			let at = DateTime::from_timestamp(secs, nanos).unwrap();
			let decoded = decode_file_time(&encode_file_time(at).to_string()).unwrap().unwrap();
			let drift = (at - decoded).num_nanoseconds().unwrap().abs();
			prop_assert!(drift < 100);
		}
	}
}
