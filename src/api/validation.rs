use super::ApiError;
use crate::constants::limits;

/// Returns the trimmed channel/event pair, or the 400 both endpoints use when
/// either is missing.
pub fn require_channel_and_event<'a>(
    channel: Option<&'a str>,
    event: Option<&'a str>,
) -> Result<(&'a str, &'a str), ApiError> {
    let channel = channel.map(str::trim).filter(|s| !s.is_empty());
    let event = event.map(str::trim).filter(|s| !s.is_empty());

    let (Some(channel), Some(event)) = (channel, event) else {
        return Err(ApiError::validation("Missing channel or event"));
    };

    if channel.len() > limits::MAX_CHANNEL_LEN {
        return Err(ApiError::validation(format!(
            "Channel must be {} characters or less",
            limits::MAX_CHANNEL_LEN
        )));
    }

    if event.len() > limits::MAX_EVENT_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Event name must be {} characters or less",
            limits::MAX_EVENT_NAME_LEN
        )));
    }

    Ok((channel, event))
}

/// Parses the `since` query parameter. Absent or empty means 0.
pub fn parse_since(since: Option<&str>) -> Result<i64, ApiError> {
    match since.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(0),
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ApiError::validation(format!(
                "Invalid since: {raw}. Must be an integer epoch-millisecond timestamp"
            ))
        }),
    }
}

pub fn validate_identifier<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{name} cannot be empty")));
    }
    if trimmed.len() > limits::MAX_CHANNEL_LEN {
        return Err(ApiError::validation(format!(
            "{name} must be {} characters or less",
            limits::MAX_CHANNEL_LEN
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_channel_and_event() {
        assert_eq!(
            require_channel_and_event(Some("post:1"), Some("bookmark:updated")).unwrap(),
            ("post:1", "bookmark:updated")
        );
        assert!(require_channel_and_event(None, Some("e")).is_err());
        assert!(require_channel_and_event(Some("c"), None).is_err());
        assert!(require_channel_and_event(Some(""), Some("e")).is_err());
        assert!(require_channel_and_event(Some("c"), Some("   ")).is_err());
        assert!(require_channel_and_event(Some(&"c".repeat(257)), Some("e")).is_err());
    }

    #[test]
    fn test_parse_since() {
        assert_eq!(parse_since(None).unwrap(), 0);
        assert_eq!(parse_since(Some("")).unwrap(), 0);
        assert_eq!(
            parse_since(Some("1700000000000")).unwrap(),
            1_700_000_000_000
        );
        assert!(parse_since(Some("yesterday")).is_err());
        assert!(parse_since(Some("12.5")).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("User id", " 42 ").unwrap(), "42");
        assert!(validate_identifier("User id", "").is_err());
        assert!(validate_identifier("User id", "   ").is_err());
    }
}
