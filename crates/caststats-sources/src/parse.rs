//! Lenient readers for upstream JSON documents

use caststats_common::{FollowCounts, SourceResult};
use serde_json::Value;

/// Read a non-negative count from a number or a numeric string
///
/// Fractional values are truncated; negative, non-finite and non-numeric
/// values read as absent.
pub fn read_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Follow counts from the user object at `pointer`
///
/// No user object means `Unavailable`; a user with a missing count is an
/// estimate with that count as zero.
///
/// A user object with neither count readable still yields `(0, 0)` rather
/// than `Unavailable`, so the fid-derived fallback is not used. The provider
/// did answer for this user, and zeros are what a profile without counts
/// shows. The estimate flag marks the record and the value is never cached.
pub fn follow_counts_at(
    document: &Value,
    pointer: &str,
    followers_field: &str,
    following_field: &str,
) -> SourceResult<FollowCounts> {
    let user = match document.pointer(pointer) {
        Some(user @ Value::Object(_)) => user,
        _ => return SourceResult::Unavailable,
    };

    let followers = read_count(user.get(followers_field));
    let following = read_count(user.get(following_field));

    match (followers, following) {
        (Some(followers), Some(following)) => {
            SourceResult::real(FollowCounts::new(followers, following))
        }
        (followers, following) => SourceResult::estimated(FollowCounts::new(
            followers.unwrap_or(0),
            following.unwrap_or(0),
        )),
    }
}
