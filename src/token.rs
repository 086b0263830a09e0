use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value as JsonValue;
use time::{Duration, OffsetDateTime};

use crate::error::Error;

/// Tokens are treated as expired this long before their `exp` claim.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(5);

/// Reads the `exp` claim of a bearer token without verifying its signature.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the token is empty, has fewer than two
/// dot-separated segments, the payload is not base64 JSON, or `exp` is missing.
pub fn decode_expiry(token: &str) -> Result<OffsetDateTime, Error> {
    let claims = decode_payload(token)?;
    let exp = claims
        .get("exp")
        .filter(|v| v.is_number())
        .ok_or_else(|| Error::Decode("missing claim: exp".into()))?;
    numeric_date(exp).ok_or_else(|| Error::Decode(format!("exp out of range: {exp}")))
}

/// NumericDate: seconds since the epoch, possibly fractional.
fn numeric_date(value: &JsonValue) -> Option<OffsetDateTime> {
    if let Some(secs) = value.as_i64() {
        return OffsetDateTime::from_unix_timestamp(secs).ok();
    }
    let secs = value.as_f64().filter(|v| v.is_finite())?;
    let whole = secs.floor();
    #[allow(clippy::cast_possible_truncation)]
    let (whole_secs, nanos) = (whole as i64, ((secs - whole) * 1e9) as i64);
    OffsetDateTime::from_unix_timestamp(whole_secs)
        .ok()?
        .checked_add(Duration::nanoseconds(nanos))
}

/// Decodes the claims segment of a bearer token.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the token is malformed.
pub fn decode_payload(token: &str) -> Result<JsonValue, Error> {
    if token.is_empty() {
        return Err(Error::Decode("empty token".into()));
    }

    let payload_b64 = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Decode("invalid token format".into()))?;
    let payload_b64 = payload_b64.trim_end_matches('=');

    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| STANDARD_NO_PAD.decode(payload_b64))
        .map_err(|_| Error::Decode("invalid token payload".into()))?;

    let claims: JsonValue = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Decode(format!("invalid token payload: {e}")))?;
    if !claims.is_object() {
        return Err(Error::Decode("token payload is not an object".into()));
    }
    Ok(claims)
}

/// Early-expiry check: `now >= exp - buffer`. Unreadable tokens count as expired.
#[must_use]
pub fn is_expired_at(token: &str, now: OffsetDateTime, buffer: Duration) -> bool {
    match decode_expiry(token) {
        Ok(exp) => exp.checked_sub(buffer).is_none_or(|deadline| now >= deadline),
        Err(e) => {
            if !token.is_empty() {
                tracing::warn!(error = %e, "Unreadable token treated as expired");
            }
            true
        }
    }
}

/// [`is_expired_at`] against the current time with the default buffer.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, OffsetDateTime::now_utc(), EXPIRY_BUFFER)
}

#[cfg(test)]
pub(crate) fn token_with_claims(claims: &JsonValue) -> String {
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("header.{payload}.signature")
}
