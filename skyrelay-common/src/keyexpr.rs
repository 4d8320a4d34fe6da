use crate::error::{Error, Result};

/// Convert a ROS-style topic name into a Zenoh key expression.
///
/// Leading and trailing slashes are dropped, so `/all_uavs_gps` maps to
/// `all_uavs_gps` and `/fleet/gps/` to `fleet/gps`. Wildcards (`*`, `**`)
/// are passed through untouched.
///
/// # Example
/// ```
/// use skyrelay_common::keyexpr::topic_to_key_expr;
///
/// assert_eq!(topic_to_key_expr("/all_uavs_gps").unwrap(), "all_uavs_gps");
/// ```
pub fn topic_to_key_expr(topic: &str) -> Result<String> {
    let trimmed = topic.trim_matches('/');

    if trimmed.is_empty() {
        return Err(Error::KeyExpr(format!("topic '{}' is empty", topic)));
    }

    if trimmed.contains("//") {
        return Err(Error::KeyExpr(format!(
            "topic '{}' contains an empty segment",
            topic
        )));
    }

    if trimmed.chars().any(|c| c.is_whitespace() || matches!(c, '?' | '#' | '$')) {
        return Err(Error::KeyExpr(format!(
            "topic '{}' contains characters not allowed in a key expression",
            topic
        )));
    }

    Ok(trimmed.to_string())
}
