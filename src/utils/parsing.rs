//! Parsing utilities for sensor tool output.

use crate::config::Celsius;

/// Temperatures recovered from line-oriented tool output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReadings {
    /// Successfully parsed values, in output order.
    pub values: Vec<Celsius>,
    /// Non-empty lines that were not numbers.
    pub rejected: Vec<String>,
}

/// Parse one temperature per line, as printed by
/// `nvidia-smi --query-gpu=temperature.gpu --format=csv,noheader,nounits`.
///
/// Blank lines are ignored. Anything else that is not a number (for example
/// `[N/A]` on a GPU that fell off the bus) is collected in `rejected`.
///
/// # Example
/// ```
/// use chassis_fan_control::utils::parsing::parse_temperature_lines;
///
/// let parsed = parse_temperature_lines("65\n70\n[N/A]\n");
/// assert_eq!(parsed.values, vec![65.0, 70.0]);
/// assert_eq!(parsed.rejected, vec!["[N/A]".to_string()]);
/// ```
pub fn parse_temperature_lines(output: &str) -> ParsedReadings {
    let mut parsed = ParsedReadings::default();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<Celsius>() {
            Ok(value) if value.is_finite() => parsed.values.push(value),
            _ => parsed.rejected.push(line.to_string()),
        }
    }

    parsed
}
