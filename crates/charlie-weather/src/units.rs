//! Display helpers for temperatures and city names.

use unicode_normalization::UnicodeNormalization;

/// `"<n> °C"`, with the reading truncated toward zero.
pub fn to_celsius_display(temperature: f64) -> String {
    format!("{} °C", temperature.trunc() as i64)
}

/// `"<n> °F"`, converted then truncated toward zero.
pub fn to_fahrenheit_display(temperature: f64) -> String {
    format!("{} °F", (temperature * 1.8 + 32.0).trunc() as i64)
}

/// Strip diacritics so accented city names match what the provider expects.
pub fn normalize_city(city: &str) -> String {
    city.trim()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}
