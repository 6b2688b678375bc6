//! Conversion of unit strings to SI scale factors.
//!
//! Unit strings are products of base units with optional integer exponents (`m**3`),
//! optionally divided by a second such product, e.g. `kg/m**3`, `m/year` or `MPa`.

pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;
pub const SECONDS_PER_YEAR: f64 = 365.25 * SECONDS_PER_DAY;

fn base_unit_scale(unit: &str) -> Option<f64> {
    let scale = match unit {
        "none" | "dimensionless" | "1" => 1.0,
        "m" | "meter" | "meters" => 1.0,
        "km" => 1.0e3,
        "cm" => 1.0e-2,
        "mm" => 1.0e-3,
        "s" | "second" | "seconds" => 1.0,
        "min" | "minute" | "minutes" => SECONDS_PER_MINUTE,
        "hour" | "hours" => SECONDS_PER_HOUR,
        "day" | "days" => SECONDS_PER_DAY,
        "year" | "years" | "yr" => SECONDS_PER_YEAR,
        "Pa" => 1.0,
        "kPa" => 1.0e3,
        "MPa" => 1.0e6,
        "GPa" => 1.0e9,
        "kg" => 1.0,
        "g" => 1.0e-3,
        _ => return None,
    };
    Some(scale)
}

fn product_scale(product: &str) -> Option<f64> {
    let mut scale = 1.0;
    for factor in product.split('*').filter(|s| !s.is_empty()) {
        scale *= base_unit_scale(factor)?;
    }
    Some(scale)
}

fn term_scale(term: &str) -> Option<f64> {
    let term = term.trim();
    match term.split_once("**") {
        Some((base, exponent)) => {
            let exponent: i32 = exponent.trim().parse().ok()?;
            Some(product_scale(base.trim())?.powi(exponent))
        }
        None => product_scale(term),
    }
}

/// Returns the factor converting a value in the given unit to SI.
///
/// Returns `None` if the unit is not recognized.
pub fn parse_scale(unit: &str) -> Option<f64> {
    let unit = unit.trim();
    match unit.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator = if numerator.trim().is_empty() {
                1.0
            } else {
                term_scale(numerator)?
            };
            let denominator = term_scale(denominator)?;
            Some(numerator / denominator)
        }
        None => term_scale(unit),
    }
}
