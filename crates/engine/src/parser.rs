use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use relay_core::{TokenCounts, UsageRecord, interaction_fingerprint};

fn parse_json_line(line: &str) -> Option<Value> {
    serde_json::from_str(line).ok()
}

fn normalize_timestamp(raw: &str) -> Option<String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(
            parsed
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        let dt = DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc);
        return Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    None
}

fn extract_usage(message: &Value) -> Option<TokenCounts> {
    let usage = message.get("usage")?;
    Some(TokenCounts {
        input_tokens: usage.get("input_tokens")?.as_u64()?,
        output_tokens: usage.get("output_tokens")?.as_u64()?,
        cache_creation_tokens: usage
            .get("cache_creation_input_tokens")
            .and_then(|value| value.as_u64())
            .unwrap_or(0),
        cache_read_tokens: usage
            .get("cache_read_input_tokens")
            .and_then(|value| value.as_u64())
            .unwrap_or(0),
    })
}

/// Decode one log line into a usage record. Every rejection is silent: the
/// host writer interleaves many event kinds we have no interest in.
pub fn parse_usage_line(line: &str) -> Option<UsageRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let obj = parse_json_line(line)?;
    let raw_ts = obj.get("timestamp")?.as_str()?;
    let timestamp = normalize_timestamp(raw_ts)?;
    let message = obj.get("message")?;
    let tokens = extract_usage(message)?;
    let model = message
        .get("model")
        .and_then(|value| value.as_str())
        .unwrap_or("unknown")
        .to_string();
    let session_id = obj
        .get("sessionId")
        .and_then(|value| value.as_str())
        .map(str::to_string);
    let message_id = message.get("id").and_then(|value| value.as_str());
    let request_id = obj.get("requestId").and_then(|value| value.as_str());
    let fingerprint = interaction_fingerprint(raw_ts, message_id, request_id);

    Some(UsageRecord {
        timestamp,
        tokens,
        model,
        session_id,
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_LINE: &str = r#"{"timestamp":"2025-06-10T12:00:00.500Z","sessionId":"session-1","requestId":"req_9","message":{"id":"msg_1","model":"claude-test","usage":{"input_tokens":100,"output_tokens":20,"cache_creation_input_tokens":5,"cache_read_input_tokens":7}}}"#;

    #[test]
    fn parses_full_record() {
        let record = parse_usage_line(FULL_LINE).expect("record");
        assert_eq!(record.timestamp, "2025-06-10T12:00:00.500Z");
        assert_eq!(record.tokens.input_tokens, 100);
        assert_eq!(record.tokens.output_tokens, 20);
        assert_eq!(record.tokens.cache_creation_tokens, 5);
        assert_eq!(record.tokens.cache_read_tokens, 7);
        assert_eq!(record.model, "claude-test");
        assert_eq!(record.session_id.as_deref(), Some("session-1"));
        assert_eq!(record.fingerprint.len(), 64);
    }

    #[test]
    fn rejects_empty_and_whitespace_lines() {
        assert!(parse_usage_line("").is_none());
        assert!(parse_usage_line("   \t ").is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_usage_line("{not json").is_none());
        assert!(parse_usage_line("plain text line").is_none());
    }

    #[test]
    fn rejects_missing_timestamp() {
        let line = r#"{"message":{"usage":{"input_tokens":1,"output_tokens":1}}}"#;
        assert!(parse_usage_line(line).is_none());
    }

    #[test]
    fn rejects_unparseable_timestamp() {
        let line = r#"{"timestamp":"yesterday","message":{"usage":{"input_tokens":1,"output_tokens":1}}}"#;
        assert!(parse_usage_line(line).is_none());
    }

    #[test]
    fn rejects_missing_usage() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"id":"msg_1"}}"#;
        assert!(parse_usage_line(line).is_none());
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","type":"summary"}"#;
        assert!(parse_usage_line(line).is_none());
    }

    #[test]
    fn rejects_non_integer_token_counts() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":"10","output_tokens":1}}}"#;
        assert!(parse_usage_line(line).is_none());
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":1.5,"output_tokens":1}}}"#;
        assert!(parse_usage_line(line).is_none());
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":-1,"output_tokens":1}}}"#;
        assert!(parse_usage_line(line).is_none());
    }

    #[test]
    fn cache_counters_default_to_zero() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":10,"output_tokens":2}}}"#;
        let record = parse_usage_line(line).expect("record");
        assert_eq!(record.tokens.cache_creation_tokens, 0);
        assert_eq!(record.tokens.cache_read_tokens, 0);
    }

    #[test]
    fn model_defaults_to_unknown() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":10,"output_tokens":2}}}"#;
        let record = parse_usage_line(line).expect("record");
        assert_eq!(record.model, "unknown");
        assert!(record.session_id.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","uuid":"x","cwd":"/tmp","message":{"role":"assistant","usage":{"input_tokens":1,"output_tokens":1,"service_tier":"standard"}}}"#;
        assert!(parse_usage_line(line).is_some());
    }

    #[test]
    fn normalizes_timestamp_to_utc_millis() {
        let line = r#"{"timestamp":"2025-06-10T14:00:00+02:00","message":{"usage":{"input_tokens":1,"output_tokens":1}}}"#;
        let record = parse_usage_line(line).expect("record");
        assert_eq!(record.timestamp, "2025-06-10T12:00:00.000Z");
    }

    #[test]
    fn fingerprint_uses_raw_timestamp_and_ids() {
        let record = parse_usage_line(FULL_LINE).expect("record");
        let expected =
            interaction_fingerprint("2025-06-10T12:00:00.500Z", Some("msg_1"), Some("req_9"));
        assert_eq!(record.fingerprint, expected);
    }

    #[test]
    fn fingerprint_tolerates_missing_ids() {
        let line = r#"{"timestamp":"2025-06-10T12:00:00Z","message":{"usage":{"input_tokens":1,"output_tokens":1}}}"#;
        let record = parse_usage_line(line).expect("record");
        let expected = interaction_fingerprint("2025-06-10T12:00:00Z", None, None);
        assert_eq!(record.fingerprint, expected);
    }
}
