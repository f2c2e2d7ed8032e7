//! Token lifetime bounds

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::AuthError;

/// Last year an expiry may fall in. Later timestamps no longer format to the
/// fixed-width text the store compares.
const MAX_EXPIRY_YEAR: i32 = 9999;

/// Check that a configured lifetime is positive and that tokens issued with it
/// from `now` expire no later than [`MAX_EXPIRY_YEAR`].
///
/// `lifetime` is `None` when the configured count overflowed `Duration`.
pub(crate) fn checked_lifetime(
    what: &str,
    lifetime: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<Duration, AuthError> {
    let too_large = || AuthError::Configuration(format!("{} is too large", what));

    let lifetime = lifetime.ok_or_else(too_large)?;
    if lifetime <= Duration::zero() {
        return Err(AuthError::Configuration(format!("{} must be positive", what)));
    }

    match now.checked_add_signed(lifetime) {
        Some(expiry) if expiry.year() <= MAX_EXPIRY_YEAR => Ok(lifetime),
        _ => Err(too_large()),
    }
}
