//! Kubernetes resource quantity parsing
//!
//! Snapshots carry request and allocatable lists as raw quantity strings
//! (`500m`, `2`, `1Gi`). Analysis works on integers, so quantities are
//! normalized per resource: cpu to millicores (stored as `vcore`), memory to
//! megabytes, anything else to a whole count.

use crate::error::{AnalysisError, Result};
use crate::models::Resources;
use std::collections::BTreeMap;

/// Canonical name of the cpu resource
pub const VCORE: &str = "vcore";

/// Canonical name of the memory resource
pub const MEMORY: &str = "memory";

const BINARY_SUFFIXES: &[(&str, i32)] = &[
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Parse a quantity string into its value in base units
pub fn parse_quantity(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    let invalid = |reason: &str| AnalysisError::InvalidQuantity {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(invalid("missing numeric part"));
    }
    let base: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
    if base < 0.0 {
        return Err(invalid("negative quantity"));
    }

    if suffix.is_empty() {
        return Ok(base);
    }
    if let Some((_, exp)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Ok(base * 2f64.powi(*exp));
    }
    let exp = match DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        Some((_, exp)) => *exp,
        None => suffix
            .strip_prefix(['e', 'E'])
            .ok_or_else(|| invalid("unknown suffix"))?
            .parse()
            .map_err(|_| invalid("malformed exponent"))?,
    };

    Ok(scale_decimal(base, exp))
}

fn scale_decimal(base: f64, exp: i32) -> f64 {
    // divide for negative exponents so values like 500m stay exact
    if exp < 0 {
        base / 10f64.powi(-exp)
    } else {
        base * 10f64.powi(exp)
    }
}

/// Map a Kubernetes resource name to the name used in analysis
pub fn canonical_resource_name(name: &str) -> &str {
    match name {
        "cpu" => VCORE,
        other => other,
    }
}

/// Normalize a raw resource list into integer quantities
pub fn normalize_resources(raw: &BTreeMap<String, String>) -> Result<Resources> {
    raw.iter()
        .map(|(name, value)| {
            let quantity = parse_quantity(value)?;
            let normalized = match name.as_str() {
                "cpu" => quantity * 1000.0,
                "memory" => quantity / 1_000_000.0,
                _ => quantity,
            };
            // round up the way scaled quantity conversion does, guarding
            // against float noise on exact values
            let rounded = (normalized - 1e-9).ceil().max(0.0) as u64;
            Ok((canonical_resource_name(name).to_string(), rounded))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_decimal_suffixes() {
        assert_eq!(parse_quantity("2").unwrap(), 2.0);
        assert_eq!(parse_quantity("500m").unwrap(), 0.5);
        assert_eq!(parse_quantity("1.5k").unwrap(), 1500.0);
        assert_eq!(parse_quantity("3e3").unwrap(), 3000.0);
    }

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024.0);
        assert_eq!(parse_quantity("128Mi").unwrap(), 134_217_728.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("10Xi").is_err());
        assert!(parse_quantity("-1").is_err());
    }

    #[test]
    fn test_normalize_resources() {
        let raw: BTreeMap<String, String> = [
            ("cpu", "250m"),
            ("memory", "1Gi"),
            ("nvidia.com/gpu", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let resources = normalize_resources(&raw).unwrap();
        assert_eq!(resources.get(VCORE), 250);
        // 1073741824 bytes is 1073.74 MB, rounded up
        assert_eq!(resources.get(MEMORY), 1074);
        assert_eq!(resources.get("nvidia.com/gpu"), 1);
        assert!(!resources.contains("cpu"));
    }

    #[test]
    fn test_canonical_resource_name() {
        assert_eq!(canonical_resource_name("cpu"), "vcore");
        assert_eq!(canonical_resource_name("memory"), "memory");
    }
}
