//! Location splitting.
//!
//! The feed blurs house numbers into a range token such as `22XX`
//! (2200–2299). When a location starts with such a token followed by a
//! space, it is split off as the house number; everything after that
//! single space is the street name.

use once_cell::sync::Lazy;
use regex::Regex;

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?s)(?:([0-9]+XX) )?(.*)$").expect("static location pattern"));

/// Split a free-text location into `(house_number, street_name)`.
///
/// Never fails: without a leading range token the house number is empty
/// and the whole input is the street name.
pub fn split_location(location: &str) -> (String, String) {
    match LOCATION_RE.captures(location) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
        ),
        None => (String::new(), location.to_string()),
    }
}
