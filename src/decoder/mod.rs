// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register decoding
//!
//! Turns the raw 16-bit words of one register read into a typed engineering value.
//!
//! ## Wire layout
//!
//! Bytes inside a word are always big-endian. Word order depends on the type:
//!
//! | Type          | Words | Word order          |
//! |---------------|-------|---------------------|
//! | S16, U16      | 1     | n/a                 |
//! | S32, U32      | 2     | low word first      |
//! | U64           | 4     | high word first     |
//! | STR16         | 8     | first word first    |
//! | STR32         | 16    | first word first    |
//! | Unknown       | 1     | decoded as U16      |
//!
//! ## Sentinels
//!
//! The inverter reports "no reading" as `0x80000000` (minimum signed 32-bit) or
//! `0xFFFFFFFF` (maximum unsigned 32-bit). Any decoded integer equal to one of
//! these becomes [`DecodedValue::Absent`], whatever the declared type or scale.

use std::fmt;

use crate::register_map::{DataType, RegisterSpec, Scale};

/// Minimum signed 32-bit value, reported by the device when it has no reading.
pub const MIN_SIGNED: i128 = i32::MIN as i128;
/// Maximum unsigned 32-bit value, reported by the device when it has no reading.
pub const MAX_UNSIGNED: i128 = u32::MAX as i128;

/// Decimal number stored as an integer mantissa and a count of decimals.
///
/// `FixedPoint { mantissa: 12345, decimals: 2 }` is `123.45`. Keeping the
/// mantissa makes the scaling exactly reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    pub mantissa: i128,
    pub decimals: u32,
}

impl FixedPoint {
    pub fn new(mantissa: i128, decimals: u32) -> Self {
        Self { mantissa, decimals }
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.decimals as i32)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10u128.pow(self.decimals);
        let magnitude = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.decimals as usize
        )
    }
}

/// Value of one register after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Signed(i64),
    Unsigned(u64),
    Decimal(FixedPoint),
    Text(String),
    /// Sentinel reading, or a read too short to decode
    Absent,
}

impl DecodedValue {
    /// Numeric view used for aggregation. Text and absent values have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Signed(v) => Some(*v as f64),
            DecodedValue::Unsigned(v) => Some(*v as f64),
            DecodedValue::Decimal(v) => Some(v.to_f64()),
            DecodedValue::Text(_) | DecodedValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, DecodedValue::Absent)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Signed(v) => write!(f, "{}", v),
            DecodedValue::Unsigned(v) => write!(f, "{}", v),
            DecodedValue::Decimal(v) => write!(f, "{}", v),
            DecodedValue::Text(v) => write!(f, "{}", v),
            DecodedValue::Absent => write!(f, "None"),
        }
    }
}

/// Decode the words of one register read.
///
/// Only the first `spec.width()` words are used. A slice shorter than that
/// decodes as [`DecodedValue::Absent`].
pub fn decode(spec: &RegisterSpec, words: &[u16]) -> DecodedValue {
    let width = spec.width() as usize;
    if words.len() < width {
        return DecodedValue::Absent;
    }
    let words = &words[..width];

    if spec.data_type.is_text() {
        return DecodedValue::Text(decode_text(words));
    }

    let raw = decode_integer(spec.data_type, words);
    if raw == MIN_SIGNED || raw == MAX_UNSIGNED {
        return DecodedValue::Absent;
    }

    match spec.scale {
        Scale::None if spec.data_type.is_signed() => DecodedValue::Signed(raw as i64),
        Scale::None => DecodedValue::Unsigned(raw as u64),
        scale => DecodedValue::Decimal(FixedPoint::new(raw, scale.decimals())),
    }
}

/// Combine words into an integer according to the type's word order and signedness.
fn decode_integer(data_type: DataType, words: &[u16]) -> i128 {
    let combined = if data_type.low_word_first() {
        words
            .iter()
            .rev()
            .fold(0u64, |acc, word| (acc << 16) | u64::from(*word))
    } else {
        words
            .iter()
            .fold(0u64, |acc, word| (acc << 16) | u64::from(*word))
    };

    match data_type {
        DataType::S16 => i128::from(combined as u16 as i16),
        DataType::S32 => i128::from(combined as u32 as i32),
        DataType::U16 | DataType::Unknown => i128::from(combined as u16),
        DataType::U32 => i128::from(combined as u32),
        DataType::U64 | DataType::Str16 | DataType::Str32 => i128::from(combined),
    }
}

fn decode_text(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    let end = bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
