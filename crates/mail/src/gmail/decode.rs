//! Decoding of Gmail metadata responses into domain records

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use super::api::{GmailMessage, MessagePayload};
use crate::models::{MessageId, MessageRecord};

/// Headers requested from the metadata endpoint. Everything the grouping
/// and bulk-action loop needs, nothing more.
pub const METADATA_HEADERS: [&str; 5] = [
    "From",
    "Subject",
    "Date",
    "List-Unsubscribe",
    "List-Unsubscribe-Post",
];

/// Decode a metadata response into a [`MessageRecord`].
///
/// The raw `From:` header is kept as-is; normalization happens downstream.
/// The `Date:` header is re-emitted in canonical RFC 3339 UTC form, or
/// empty when no format in the ladder matches.
pub fn decode_metadata(msg: &GmailMessage) -> MessageRecord {
    let mut from = String::new();
    let mut subject = String::new();
    let mut date = String::new();
    let mut list_unsubscribe = String::new();
    let mut list_unsubscribe_post = String::new();

    if let Some(payload) = &msg.payload {
        from = extract_header(payload, "From").unwrap_or_default();
        subject = extract_header(payload, "Subject").unwrap_or_default();
        date = extract_header(payload, "Date").unwrap_or_default();
        list_unsubscribe = extract_header(payload, "List-Unsubscribe").unwrap_or_default();
        list_unsubscribe_post =
            extract_header(payload, "List-Unsubscribe-Post").unwrap_or_default();
    }

    MessageRecord {
        id: MessageId::new(&msg.id),
        sender: from,
        subject,
        date: parse_date_rfc3339(&date),
        list_unsubscribe,
        list_unsubscribe_post,
    }
}

/// Extract a header value by name, matching ASCII-case-insensitively
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Normalize a `Date:` header into RFC 3339 UTC where possible.
///
/// Tries the formats mail providers actually emit, in order, and returns
/// the first success rendered with whole-second precision and a `Z`
/// suffix. Returns an empty string when nothing matches; downstream code
/// treats empty as "unknown", never as the epoch.
pub fn parse_date_rfc3339(header: &str) -> String {
    let raw = header.trim();
    if raw.is_empty() {
        return String::new();
    }

    // RFC 2822 covers the common cases: RFC 1123 with numeric or obsolete
    // named zones, optional weekday, and single-digit days.
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return to_canonical(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return to_canonical(dt.with_timezone(&Utc));
    }

    // Older zoned layouts chrono's RFC 2822 parser rejects.
    const ZONED: [&str; 2] = [
        // RFC 822 with numeric zone, no seconds
        "%d %b %y %H:%M %z",
        // RFC 850 with numeric zone
        "%A, %d-%b-%y %H:%M:%S %z",
    ];
    for layout in ZONED {
        if let Ok(dt) = DateTime::parse_from_str(raw, layout) {
            return to_canonical(dt.with_timezone(&Utc));
        }
    }

    // Zone-less layouts are taken as UTC.
    const NAIVE: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %y %H:%M",
        "%A, %d-%b-%y %H:%M:%S",
    ];
    for layout in NAIVE {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return to_canonical(Utc.from_utc_datetime(&dt));
        }
    }

    String::new()
}

fn to_canonical(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::Header;

    fn make_metadata(id: &str, headers: Vec<(&str, &str)>) -> GmailMessage {
        GmailMessage {
            id: id.to_string(),
            payload: Some(MessagePayload {
                headers: Some(
                    headers
                        .into_iter()
                        .map(|(n, v)| Header {
                            name: n.to_string(),
                            value: v.to_string(),
                        })
                        .collect(),
                ),
                mime_type: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_metadata() {
        let msg = make_metadata(
            "m1",
            vec![
                ("From", "Alice <alice@example.com>"),
                ("Subject", "Hello"),
                ("Date", "Tue, 2 Jan 2024 15:04:05 -0700"),
                ("List-Unsubscribe", "<https://example.com/u>"),
                ("List-Unsubscribe-Post", "List-Unsubscribe=One-Click"),
            ],
        );

        let rec = decode_metadata(&msg);
        assert_eq!(rec.id.as_str(), "m1");
        assert_eq!(rec.sender, "Alice <alice@example.com>");
        assert_eq!(rec.subject, "Hello");
        assert_eq!(rec.date, "2024-01-02T22:04:05Z");
        assert_eq!(rec.list_unsubscribe, "<https://example.com/u>");
        assert_eq!(rec.list_unsubscribe_post, "List-Unsubscribe=One-Click");
    }

    #[test]
    fn test_decode_missing_headers() {
        let msg = make_metadata("m2", vec![("Subject", "Only subject")]);
        let rec = decode_metadata(&msg);
        assert_eq!(rec.sender, "");
        assert_eq!(rec.subject, "Only subject");
        assert_eq!(rec.date, "");
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let msg = make_metadata("m3", vec![("FROM", "x@y.com"), ("subject", "s")]);
        let rec = decode_metadata(&msg);
        assert_eq!(rec.sender, "x@y.com");
        assert_eq!(rec.subject, "s");
    }

    #[test]
    fn test_parse_date_formats() {
        let cases = [
            // RFC 1123 with numeric zone
            ("Mon, 02 Jan 2006 15:04:05 -0700", "2006-01-02T22:04:05Z"),
            // single-digit day
            ("Mon, 2 Jan 2006 15:04:05 -0700", "2006-01-02T22:04:05Z"),
            // named zone
            ("Mon, 02 Jan 2006 15:04:05 GMT", "2006-01-02T15:04:05Z"),
            // no weekday
            ("02 Jan 2006 15:04:05 +0000", "2006-01-02T15:04:05Z"),
            // RFC 3339
            ("2006-01-02T15:04:05Z", "2006-01-02T15:04:05Z"),
            ("2006-01-02T15:04:05+02:00", "2006-01-02T13:04:05Z"),
        ];
        for (input, want) in cases {
            assert_eq!(parse_date_rfc3339(input), want, "input: {input:?}");
        }
    }

    #[test]
    fn test_parse_date_failure_is_empty() {
        assert_eq!(parse_date_rfc3339(""), "");
        assert_eq!(parse_date_rfc3339("not a date"), "");
        assert_eq!(parse_date_rfc3339("2006-13-45"), "");
    }

    #[test]
    fn test_canonical_dates_compare_lexicographically() {
        let earlier = parse_date_rfc3339("Mon, 02 Jan 2006 10:00:00 +0000");
        let later = parse_date_rfc3339("Mon, 02 Jan 2006 09:00:00 -0500");
        // 09:00 -0500 is 14:00 UTC, after 10:00 UTC
        assert!(earlier < later);
    }
}
