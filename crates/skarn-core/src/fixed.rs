//! Fixed-point wire numeric.
//!
//! All quantized geometry and effect parameters cross the wire as
//! integers at a fixed scale of 100 (two decimal digits). [`Fx`] makes
//! the rounding rule explicit instead of scattering `(v * 100.0) as i64`
//! casts: conversion rounds to nearest with ties away from zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-point number: `i64` mantissa at scale 100.
///
/// Serializes as the bare integer mantissa, which is the wire contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fx(pub i64);

impl Fx {
    /// Units per whole number.
    pub const SCALE: i64 = 100;

    /// The zero value.
    pub const ZERO: Self = Self(0);

    /// Quantize a float. Rounds to nearest, ties away from zero
    /// (`f64::round` semantics).
    pub fn from_f64(v: f64) -> Self {
        Self((v * Self::SCALE as f64).round() as i64)
    }

    /// Construct from a whole number of units.
    pub fn from_int(v: i64) -> Self {
        Self(v * Self::SCALE)
    }

    /// Dequantize to a float.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// The raw mantissa.
    pub fn raw(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Fx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
