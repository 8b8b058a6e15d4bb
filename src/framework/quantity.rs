//! Resource quantities
//!
//! The API server canonicalises quantities on write, so a LimitRange created
//! with `100Mi` may come back unchanged, or as `104857600` from a defaulting
//! path. Comparisons therefore go through [`ParsedQuantity`], which holds the
//! value in billionths of the base unit (the finest precision the API server
//! keeps), rounding any finer fraction up.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::{Error, Result};

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";

/// Nano precision: the smallest unit the API server represents
const NANO_EXPONENT: i32 = 9;

/// Longest digit string accepted before the suffix
const MAX_DIGITS: usize = 30;

/// Largest decimal exponent accepted (`1e60` and beyond is rejected)
const MAX_EXPONENT: i32 = 60;

/// A quantity parsed into a comparable integer of nano-units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedQuantity {
    nanos: i128,
}

impl ParsedQuantity {
    pub fn from_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    /// Value in thousandths, rounded up (`250m` CPU is 250)
    pub fn milli_value(&self) -> i128 {
        ceil_div(self.nanos, 1_000_000)
    }

    /// Value in base units, rounded up (`1Ki` is 1024, `1500m` is 2)
    pub fn value(&self) -> i128 {
        ceil_div(self.nanos, 1_000_000_000)
    }

    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &'static str| Error::InvalidQuantity {
            input: input.to_string(),
            reason,
        };

        let (negative, unsigned) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            Some(_) => (false, input),
            None => return Err(invalid("empty quantity")),
        };

        let number_len = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_len);

        let (int_part, frac_part) = match number.split_once('.') {
            Some((int_part, frac_part)) => {
                if frac_part.contains('.') {
                    return Err(invalid("more than one decimal point"));
                }
                (int_part, frac_part)
            }
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("missing digits"));
        }
        if int_part.len() + frac_part.len() > MAX_DIGITS {
            return Err(invalid("too many digits"));
        }

        let mut mantissa: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa * 10 + i128::from(digit - b'0');
        }

        let (pow2, exp10) = parse_suffix(suffix).ok_or_else(|| invalid("unknown suffix"))?;

        let scale = exp10 + NANO_EXPONENT - frac_part.len() as i32;
        let scaled = mantissa
            .checked_mul(1i128 << pow2)
            .ok_or_else(|| invalid("value out of range"))?;

        let magnitude = if scale >= 0 {
            pow10(scale)
                .and_then(|factor| scaled.checked_mul(factor))
                .ok_or_else(|| invalid("value out of range"))?
        } else {
            match pow10(-scale) {
                Some(divisor) => ceil_div(scaled, divisor),
                // Divisor exceeds any representable mantissa: the fraction rounds up to one nano
                None => i128::from(scaled > 0),
            }
        };

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
        })
    }
}

impl FromStr for ParsedQuantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&Quantity> for ParsedQuantity {
    type Error = Error;

    fn try_from(q: &Quantity) -> Result<Self> {
        Self::parse(&q.0)
    }
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos % 1_000_000_000 == 0 {
            write!(f, "{}", self.nanos / 1_000_000_000)
        } else if self.nanos % 1_000_000 == 0 {
            write!(f, "{}m", self.nanos / 1_000_000)
        } else {
            write!(f, "{}n", self.nanos)
        }
    }
}

/// Binary power and decimal exponent for a suffix, `None` if unknown
fn parse_suffix(suffix: &str) -> Option<(u32, i32)> {
    let known = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            let digits = exponent
                .strip_prefix('-')
                .or_else(|| exponent.strip_prefix('+'))
                .unwrap_or(exponent);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let exp10: i32 = exponent.parse().ok()?;
            if exp10.abs() > MAX_EXPONENT {
                return None;
            }
            (0, exp10)
        }
    };
    Some(known)
}

fn pow10(exp: i32) -> Option<i128> {
    10i128.checked_pow(u32::try_from(exp).ok()?)
}

fn ceil_div(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Build a resource map from CPU, memory and ephemeral-storage strings
///
/// Empty strings leave the resource out, so `resource_list("", "150Mi", "")`
/// only sets memory.
pub fn resource_list(cpu: &str, memory: &str, ephemeral_storage: &str) -> BTreeMap<String, Quantity> {
    [
        (RESOURCE_CPU, cpu),
        (RESOURCE_MEMORY, memory),
        (RESOURCE_EPHEMERAL_STORAGE, ephemeral_storage),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(name, value)| (name.to_string(), Quantity(value.to_string())))
    .collect()
}

/// Compare two resource maps semantically
///
/// Both maps must name the same resources, and each pair of values must be
/// numerically equal.
pub fn equal_resource_list(
    expected: &BTreeMap<String, Quantity>,
    actual: &BTreeMap<String, Quantity>,
) -> Result<()> {
    for (name, want) in expected {
        match actual.get(name) {
            Some(got) if ParsedQuantity::try_from(want)? == ParsedQuantity::try_from(got)? => {}
            got => {
                return Err(Error::assertion(format!(
                    "resource {name} expected {} actual {}",
                    want.0,
                    got.map(|q| q.0.as_str()).unwrap_or("<missing>")
                )));
            }
        }
    }
    for (name, got) in actual {
        if !expected.contains_key(name) {
            return Err(Error::assertion(format!(
                "resource {name} expected <missing> actual {}",
                got.0
            )));
        }
    }
    Ok(())
}

/// Compare requests and limits of two resource requirements semantically
pub fn equal_resource_requirements(
    expected: &ResourceRequirements,
    actual: &ResourceRequirements,
) -> Result<()> {
    let empty = BTreeMap::new();

    tracing::debug!(
        "Verifying requests: expected {:?} with actual {:?}",
        expected.requests,
        actual.requests
    );
    equal_resource_list(
        expected.requests.as_ref().unwrap_or(&empty),
        actual.requests.as_ref().unwrap_or(&empty),
    )?;

    tracing::debug!(
        "Verifying limits: expected {:?} with actual {:?}",
        expected.limits,
        actual.limits
    );
    equal_resource_list(
        expected.limits.as_ref().unwrap_or(&empty),
        actual.limits.as_ref().unwrap_or(&empty),
    )
}
