//! Utility functions used by Gander, and available when embedding a load run.

use num_format::{Locale, ToFormattedString};
use regex::Regex;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::GanderError;

/// Parse a string representing a time span and return the number of seconds.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", and "s", in that order, indicating
/// "hours", "minutes", and "seconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// // 1 hour 2 minutes and 3 seconds is 3,723 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), 3_723);
///
/// // 45 seconds is 45 seconds.
/// assert_eq!(util::parse_timespan("45"), 45);
///
/// // Invalid value is 0 seconds.
/// assert_eq!(util::parse_timespan("foo"), 0);
///
/// // So is a value too large to represent.
/// assert_eq!(util::parse_timespan("6000000000000000h"), 0);
/// ```
pub fn parse_timespan(time_str: &str) -> usize {
    if let Ok(t) = usize::from_str(time_str) {
        trace!("{} is integer: {} seconds", time_str, t);
        return t;
    }

    let re = match Regex::new(r"^((?P<hours>\d+)h)?((?P<minutes>\d+)m)?((?P<seconds>\d+)s)?$") {
        Ok(re) => re,
        Err(e) => {
            warn!("failed to compile timespan regex: {}", e);
            return 0;
        }
    };
    let time_matches = match re.captures(time_str) {
        Some(captures) => captures,
        None => return 0,
    };
    // A unit too large for usize is reported as an overflow, not silently dropped.
    let unit = |name: &str| -> Option<usize> {
        match time_matches.name(name) {
            Some(m) => usize::from_str(m.as_str()).ok(),
            None => Some(0),
        }
    };
    let total = match (unit("hours"), unit("minutes"), unit("seconds")) {
        (Some(hours), Some(minutes), Some(seconds)) => hours
            .checked_mul(60 * 60)
            .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(seconds)),
        _ => None,
    };
    match total {
        Some(total) => {
            trace!("{} is {} seconds", time_str, total);
            total
        }
        None => {
            warn!("timespan {} is too large", time_str);
            0
        }
    }
}

/// Truncate strings when they're too long to display.
///
/// If a string is longer than the specified max length, this function removes extra
/// the characters and replaces the last two with a double-period ellipsis.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// // All but 7 characters are truncated, with ".." appended.
/// assert_eq!(util::truncate_string("this is a long string", 9), "this is..");
///
/// // All characters are returned as the string is less than 15 characters long.
/// assert_eq!(util::truncate_string("shorter string", 15), "shorter string");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if max_length > 2 && str_to_truncate.char_indices().count() > max_length {
        match str_to_truncate.char_indices().nth(max_length - 2) {
            None => str_to_truncate.to_string(),
            Some((idx, _)) => format!("{}..", &str_to_truncate[..idx]),
        }
    } else {
        str_to_truncate.to_string()
    }
}

/// Helper function to determine if an endpoint can be load tested.
///
/// The endpoint must parse as an absolute URL with an `http` or `https` scheme.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// // Hostname is a valid endpoint.
/// assert!(util::is_valid_endpoint("http://localhost/").is_ok());
///
/// // IP with a path is a valid endpoint.
/// assert!(util::is_valid_endpoint("http://127.0.0.1:8080/health").is_ok());
///
/// // Protocol is required.
/// assert!(util::is_valid_endpoint("example.com/").is_err());
///
/// // Only http(s) can be requested.
/// assert!(util::is_valid_endpoint("ftp://example.com/").is_err());
/// ```
pub fn is_valid_endpoint(endpoint: &str) -> Result<Url, GanderError> {
    let url = Url::parse(endpoint).map_err(|parse_error| GanderError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        detail: "Invalid endpoint.".to_string(),
        parse_error: Some(parse_error),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(GanderError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            detail: format!("Unsupported scheme `{}`, expected http or https.", scheme),
            parse_error: None,
        }),
    }
}

/// Requests per second and failures per second over the given duration.
///
/// Returns `(0.0, 0.0)` for a zero-length duration.
pub fn per_second_calculations(duration: Duration, total: usize, fail: usize) -> (f64, f64) {
    let seconds = duration.as_secs_f64();
    if seconds <= 0.0 {
        (0.0, 0.0)
    } else {
        (total as f64 / seconds, fail as f64 / seconds)
    }
}

/// Format large number in locale appropriate style.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// assert_eq!(util::format_number(10_000), "10,000");
/// ```
pub fn format_number(number: usize) -> String {
    number.to_formatted_string(&Locale::en)
}

/// Number of decimals to display: large values don't need them.
pub(crate) fn determine_precision(value: f64) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format a float with [`determine_precision`] decimals.
pub(crate) fn format_float(value: f64) -> String {
    format!("{:.*}", determine_precision(value), value)
}
