//! Grouping and ordering of message records
//!
//! Pure functions: a set of stored records in, a deterministic ordered
//! list of sender/subject groups out.

use std::collections::HashMap;

use crate::models::{group_key, MessageRecord, SenderGroup};
use crate::normalize::normalize_sender;

/// Build groups from records using normalized sender + exact, case-sensitive
/// subject as the key. Records whose sender does not normalize are skipped.
///
/// Timestamps are expected to already be canonical RFC 3339 UTC strings, so
/// first/last comparisons are string-based.
pub fn aggregate_by_sender_subject(records: &[MessageRecord]) -> HashMap<String, SenderGroup> {
    let mut groups: HashMap<String, SenderGroup> = HashMap::new();

    for rec in records {
        let email = normalize_sender(&rec.sender);
        if email.is_empty() {
            continue;
        }
        let key = group_key(&email, &rec.subject);
        let group = groups.entry(key).or_insert_with(|| SenderGroup {
            display_name: display_name_from_sender(&rec.sender, &email),
            email,
            subject: rec.subject.clone(),
            ..SenderGroup::default()
        });

        group.count += 1;
        if group.sample.is_empty() && !rec.subject.is_empty() {
            group.sample = rec.subject.clone();
        }
        let ts = rec.date.trim();
        if !ts.is_empty() {
            if group.first_date.is_empty() || ts < group.first_date.as_str() {
                group.first_date = ts.to_string();
            }
            if group.last_date.is_empty() || ts > group.last_date.as_str() {
                group.last_date = ts.to_string();
            }
        }
        if !rec.id.as_str().is_empty() {
            group.message_ids.push(rec.id.clone());
        }
        // Prefer HTTP over mailto; once set, keep the first URL seen.
        if group.unsubscribe_url.is_empty() && !rec.list_unsubscribe.is_empty() {
            group.unsubscribe_url = extract_http_unsubscribe_url(&rec.list_unsubscribe);
        }
    }

    groups
}

/// Flatten groups into a stable order: count descending, then email
/// ascending, then subject ascending.
pub fn sort_groups(groups: HashMap<String, SenderGroup>) -> Vec<SenderGroup> {
    let mut out: Vec<SenderGroup> = groups.into_values().collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.email.cmp(&b.email))
            .then_with(|| a.subject.cmp(&b.subject))
    });
    out
}

/// Find the first HTTP(S) URL in a `List-Unsubscribe` header value.
///
/// The header typically contains comma-separated angle-bracketed URLs like
/// `<https://example.com/unsub>, <mailto:unsub@example.com>`. Mailto
/// entries are ignored.
pub fn extract_http_unsubscribe_url(header: &str) -> String {
    for part in header.split(',') {
        let part = part
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();
        let lower = part.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return part.to_string();
        }
    }
    String::new()
}

/// Best-effort display name for a group, taken from its first record.
///
/// A header like `Twitter <notify@twitter.com>` yields `Twitter`. Without a
/// display-name part, the local part of the normalized address is split on
/// dots and each token initial-uppercased: `jane.doe@x.com` -> `Jane Doe`.
pub fn display_name_from_sender(from_header: &str, normalized: &str) -> String {
    if let Some(idx) = from_header.find('<') {
        if idx > 0 {
            let name = from_header[..idx].trim().trim_matches(|c| c == '"' || c == '\'');
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    if let Some(at) = normalized.find('@') {
        if at > 0 {
            let local = &normalized[..at];
            let titled: Vec<String> = local
                .split('.')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    let mut chars = part.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect();
            return titled.join(" ");
        }
    }

    normalized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;

    fn rec(id: &str, from: &str, subject: &str, date: &str) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            sender: from.to_string(),
            subject: subject.to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    fn has_id(ids: &[MessageId], want: &str) -> bool {
        ids.iter().any(|id| id.as_str() == want)
    }

    #[test]
    fn test_basic_grouping() {
        let msgs = vec![
            rec("1", "Alice <user+ads@Example.com>", "Promo", "2024-01-02T15:04:05Z"),
            rec("2", "\"Alice\" <user@EXAMPLE.com>", "Promo", "2024-01-03T15:04:05Z"),
            rec("3", "bob@example.com", "Promo", "2024-01-01T00:00:00Z"),
            rec("4", "bob@example.com", "Other", "2024-01-05T00:00:00Z"),
            rec("5", "bob@example.com", "other", "2024-01-06T00:00:00Z"),
        ];

        let groups = aggregate_by_sender_subject(&msgs);
        assert_eq!(groups.len(), 4);

        let alice = &groups["user@example.com||Promo"];
        assert_eq!(alice.email, "user@example.com");
        assert_eq!(alice.subject, "Promo");
        assert_eq!(alice.count, 2);
        assert_eq!(alice.first_date, "2024-01-02T15:04:05Z");
        assert_eq!(alice.last_date, "2024-01-03T15:04:05Z");
        assert!(has_id(&alice.message_ids, "1") && has_id(&alice.message_ids, "2"));
        assert_eq!(alice.display_name, "Alice");

        assert_eq!(groups["bob@example.com||Promo"].count, 1);
        assert_eq!(groups["bob@example.com||Other"].count, 1);
        assert_eq!(groups["bob@example.com||other"].count, 1);
    }

    #[test]
    fn test_group_identity_and_count_conservation() {
        let msgs = vec![
            rec("1", "a@x.com", "S", ""),
            rec("2", "a@x.com", "S", ""),
            rec("3", "b@x.com", "S", ""),
            rec("4", "garbage with no address", "S", ""),
        ];
        let groups = aggregate_by_sender_subject(&msgs);
        assert_eq!(groups.len(), 2);
        let total: usize = groups.values().map(|g| g.count).sum();
        // The unparsable sender is counted nowhere.
        assert_eq!(total, 3);
    }

    #[test]
    fn test_sample_is_first_non_empty_subject() {
        let msgs = vec![
            rec("1", "a@x.com", "", ""),
            rec("2", "a@x.com", "", ""),
        ];
        let groups = aggregate_by_sender_subject(&msgs);
        assert_eq!(groups["a@x.com||"].sample, "");
    }

    #[test]
    fn test_sort_tie_breakers() {
        let mut groups = HashMap::new();
        for (key, email, subject, count) in [
            ("a1", "a@example.com", "A", 5usize),
            ("a2", "a@example.com", "B", 5),
            ("b1", "b@example.com", "A", 5),
            ("c1", "c@example.com", "A", 3),
        ] {
            groups.insert(
                key.to_string(),
                SenderGroup {
                    email: email.to_string(),
                    subject: subject.to_string(),
                    count,
                    ..Default::default()
                },
            );
        }

        let out = sort_groups(groups);
        let got: Vec<(&str, &str)> = out
            .iter()
            .map(|g| (g.email.as_str(), g.subject.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a@example.com", "A"),
                ("a@example.com", "B"),
                ("b@example.com", "A"),
                ("c@example.com", "A"),
            ]
        );
    }

    #[test]
    fn test_sort_is_deterministic() {
        let msgs = vec![
            rec("1", "a@x.com", "S", ""),
            rec("2", "b@x.com", "T", ""),
            rec("3", "b@x.com", "T", ""),
        ];
        let once = sort_groups(aggregate_by_sender_subject(&msgs));
        let twice = sort_groups(aggregate_by_sender_subject(&msgs));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_http_unsubscribe_url() {
        assert_eq!(
            extract_http_unsubscribe_url("<mailto:u@x.com>, <https://ex.com/u>"),
            "https://ex.com/u"
        );
        assert_eq!(extract_http_unsubscribe_url("<mailto:u@x.com>"), "");
        assert_eq!(
            extract_http_unsubscribe_url("<HTTPS://Ex.com/U>"),
            "HTTPS://Ex.com/U"
        );
        assert_eq!(extract_http_unsubscribe_url(""), "");
    }

    #[test]
    fn test_unsubscribe_url_kept_from_first_member() {
        let mut a = rec("1", "news@x.com", "S", "");
        a.list_unsubscribe = "<https://x.com/unsub/1>".to_string();
        let mut b = rec("2", "news@x.com", "S", "");
        b.list_unsubscribe = "<https://x.com/unsub/2>".to_string();

        let groups = aggregate_by_sender_subject(&[a, b]);
        assert_eq!(
            groups["news@x.com||S"].unsubscribe_url,
            "https://x.com/unsub/1"
        );
    }

    #[test]
    fn test_display_name_fallback_from_local_part() {
        assert_eq!(
            display_name_from_sender("jane.doe@x.com", "jane.doe@x.com"),
            "Jane Doe"
        );
        assert_eq!(
            display_name_from_sender("\"Team\" <t@x.com>", "t@x.com"),
            "Team"
        );
        assert_eq!(display_name_from_sender("<t@x.com>", "t@x.com"), "T");
    }
}
