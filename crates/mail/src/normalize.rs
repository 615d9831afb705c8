//! Sender address normalization
//!
//! Reduces heterogeneous `From:` headers to a stable grouping key.

use mailparse::{addrparse, MailAddr};

/// Extract and normalize an email address from a `From:` header.
///
/// - Parses RFC 5322 values like `Name <user+alias@Example.COM>`
/// - Lowercases
/// - Strips `+alias` in the local part: `user+news@x.com` -> `user@x.com`
///
/// Returns an empty string if parsing fails or no address is present.
/// Dots in the local part are preserved: providers disagree on their
/// meaning, and folding them would merge unrelated senders.
pub fn normalize_sender(from_header: &str) -> String {
    let header = from_header.trim();
    if header.is_empty() {
        return String::new();
    }

    if let Some(addr) = first_valid_addr(header) {
        return canonicalize(&addr);
    }

    // Some headers are lists the whole-header parse rejects; retry per
    // comma-separated piece and take the first that parses.
    for piece in header.split(',') {
        if let Some(addr) = first_valid_addr(piece.trim()) {
            return canonicalize(&addr);
        }
    }

    String::new()
}

/// Parse an address header and return the first mailbox that looks like a
/// real addr-spec. `mailparse` is lenient and will hand back strings with
/// no `@` at all, so each candidate is checked before acceptance.
fn first_valid_addr(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    let parsed = addrparse(s).ok()?;
    for addr in parsed.iter() {
        match addr {
            MailAddr::Single(info) => {
                if is_addr_spec(&info.addr) {
                    return Some(info.addr.clone());
                }
            }
            MailAddr::Group(group) => {
                for info in &group.addrs {
                    if is_addr_spec(&info.addr) {
                        return Some(info.addr.clone());
                    }
                }
            }
        }
    }
    None
}

fn is_addr_spec(addr: &str) -> bool {
    match addr.rfind('@') {
        Some(at) => at > 0 && at + 1 < addr.len(),
        None => false,
    }
}

fn canonicalize(addr: &str) -> String {
    let email = addr.trim().to_ascii_lowercase();
    let Some(at) = email.rfind('@') else {
        return email;
    };
    let mut local = &email[..at];
    let domain = &email[at + 1..];

    if let Some(plus) = local.find('+') {
        local = &local[..plus];
    }

    format!("{local}@{domain}")
}
