//! Instance-id shape checks and hostname sanitization.
//!
//! The platform has migrated vendors more than once, so storage still holds
//! instance ids minted by providers we no longer call. Each adapter declares
//! the shape of its own ids; anything else is answered synthetically so stale
//! ids never trigger live API calls against the wrong vendor.

use crate::InstanceStatus;

/// Shape of the ids a vendor natively mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    /// Pure digits (Aeza, Contabo, Zomro).
    Numeric,
    /// RFC 4122 dashed hex (Cloudzy).
    Uuid,
}

const PLACEHOLDER_PREFIXES: [&str; 3] = ["mock-", "pending-", "order-"];

pub fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_uuid_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if *b != b'-' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    true
}

/// Returns the synthetic status for an id that must not be fetched from this
/// vendor, or `None` when the id looks native and a live call is warranted.
pub fn synthetic_status(instance_id: &str, native: IdShape) -> Option<InstanceStatus> {
    if PLACEHOLDER_PREFIXES
        .iter()
        .any(|p| instance_id.starts_with(p))
    {
        return Some(InstanceStatus::Mock);
    }
    match native {
        IdShape::Numeric if !is_numeric_id(instance_id) => Some(InstanceStatus::Legacy),
        IdShape::Uuid if !is_uuid_id(instance_id) => Some(InstanceStatus::Legacy),
        _ => None,
    }
}

/// Restrict a customer-chosen hostname label to `[a-zA-Z0-9-]`, max 50 chars.
/// An all-invalid input falls back to "vps" so order payloads stay well-formed.
pub fn sanitize_hostname(label: &str) -> String {
    let mut out: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(50)
        .collect();
    if out.is_empty() {
        out.push_str("vps");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_to_uuid_native_vendor_is_legacy() {
        // Stale id from the previous (numeric-id) provider stored against Cloudzy.
        assert_eq!(
            synthetic_status("203024710", IdShape::Uuid),
            Some(InstanceStatus::Legacy)
        );
    }

    #[test]
    fn uuid_id_to_numeric_native_vendor_is_legacy() {
        assert_eq!(
            synthetic_status("550e8400-e29b-41d4-a716-446655440000", IdShape::Numeric),
            Some(InstanceStatus::Legacy)
        );
    }

    #[test]
    fn placeholder_prefixes_are_mock_for_any_vendor() {
        for id in ["mock-abc123", "pending-9", "order-550e8400"] {
            assert_eq!(
                synthetic_status(id, IdShape::Numeric),
                Some(InstanceStatus::Mock)
            );
            assert_eq!(
                synthetic_status(id, IdShape::Uuid),
                Some(InstanceStatus::Mock)
            );
        }
    }

    #[test]
    fn native_ids_pass_through() {
        assert_eq!(synthetic_status("203024710", IdShape::Numeric), None);
        assert_eq!(
            synthetic_status("550e8400-e29b-41d4-a716-446655440000", IdShape::Uuid),
            None
        );
    }

    #[test]
    fn malformed_uuid_is_not_native() {
        // Right length, dash in the wrong spot.
        assert!(!is_uuid_id("550e8400e-29b-41d4-a716-446655440000"));
        assert!(!is_uuid_id("550e8400-e29b-41d4-a716-44665544000g"));
        assert!(is_uuid_id("550E8400-E29B-41D4-A716-446655440000"));
    }

    #[test]
    fn hostname_keeps_only_alphanumeric_and_hyphen() {
        assert_eq!(sanitize_hostname("my web_01!.example"), "myweb01example");
        assert_eq!(sanitize_hostname("app-server-1"), "app-server-1");
    }

    #[test]
    fn hostname_caps_at_fifty_chars() {
        let long = "a".repeat(120);
        let s = sanitize_hostname(&long);
        assert_eq!(s.len(), 50);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn hostname_never_empty() {
        assert_eq!(sanitize_hostname("!!! ***"), "vps");
        assert_eq!(sanitize_hostname(""), "vps");
    }
}
