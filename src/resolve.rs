//! # Placeholder Resolver
//!
//! Maps a field's logical key to its concrete per-recipient value, and fills
//! `{key}` tokens in email subject/body copy.
//!
//! Resolution order: reserved certificate-ID keys always win and return the
//! generator's own stable ID (they can never be overridden by recipient
//! data), then an exact match in the data mapping, then a case-insensitive
//! match. A key that matches nothing resolves to a bracketed `[key]`
//! placeholder — visibly broken output beats a silently blank certificate
//! when a layout is being debugged.

use std::collections::HashMap;

/// Whether a key names the reserved certificate ID.
///
/// Matching is on the lowercased, trimmed key: `certid`, `certificateid`
/// and `id` are all reserved.
pub fn is_cert_id_key(key: &str) -> bool {
    matches!(
        key.trim().to_lowercase().as_str(),
        "certid" | "certificateid" | "id"
    )
}

/// Resolve a field key against a recipient's data row.
///
/// Pure function: no side effects, no mutation of `data`.
pub fn resolve(key: &str, data: &HashMap<String, String>, cert_id: &str) -> String {
    if is_cert_id_key(key) {
        return cert_id.to_string();
    }

    if let Some(value) = data.get(key) {
        return value.clone();
    }

    let lower = key.to_lowercase();
    if let Some(value) = data
        .iter()
        .find(|(k, _)| k.to_lowercase() == lower)
        .map(|(_, v)| v)
    {
        return value.clone();
    }

    format!("[{key}]")
}

/// Fill `{key}` tokens in email copy (subject or body).
///
/// The reserved `{Name}` and `{CertID}` tokens are substituted first —
/// `{CertID}` always with the stable certificate ID, `{Name}` through
/// [`resolve`] so a row without a name yields the `[Name]` marker. Then every
/// key present in the data mapping replaces its own `{key}` occurrences.
/// Tokens that match nothing are left untouched.
pub fn fill_copy(template: &str, data: &HashMap<String, String>, cert_id: &str) -> String {
    let mut out = template.replace("{CertID}", cert_id);
    out = out.replace("{Name}", &resolve("Name", data, cert_id));
    for (key, value) in data {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reserved_keys_always_return_cert_id() {
        let d = data(&[("CertID", "spoofed"), ("id", "also spoofed")]);
        for key in ["CertID", "certid", " CertificateID ", "ID", "id"] {
            assert_eq!(resolve(key, &d, "CF-0001"), "CF-0001", "key {key:?}");
        }
    }

    #[test]
    fn exact_match_wins_over_case_insensitive() {
        let d = data(&[("Name", "Asha Rao"), ("name", "lowercase")]);
        assert_eq!(resolve("Name", &d, "CF-1"), "Asha Rao");
    }

    #[test]
    fn case_insensitive_fallback() {
        let d = data(&[("Course", "Rust 101")]);
        assert_eq!(resolve("course", &d, "CF-1"), "Rust 101");
        assert_eq!(resolve("COURSE", &d, "CF-1"), "Rust 101");
    }

    #[test]
    fn missing_key_resolves_to_bracketed_placeholder() {
        let d = data(&[("Name", "Asha Rao")]);
        assert_eq!(resolve("Grade", &d, "CF-1"), "[Grade]");
    }

    #[test]
    fn fill_copy_substitutes_reserved_and_data_tokens() {
        let d = data(&[("Name", "Asha Rao"), ("Course", "Rust 101")]);
        let out = fill_copy(
            "Dear {Name}, your {Course} certificate (ID: {CertID}) is attached.",
            &d,
            "CF-0001",
        );
        assert_eq!(
            out,
            "Dear Asha Rao, your Rust 101 certificate (ID: CF-0001) is attached."
        );
    }

    #[test]
    fn fill_copy_leaves_unknown_tokens_untouched() {
        let d = data(&[("Name", "Asha Rao")]);
        let out = fill_copy("Hello {Name}, grade: {Grade}", &d, "CF-1");
        assert_eq!(out, "Hello Asha Rao, grade: {Grade}");
    }

    #[test]
    fn fill_copy_marks_missing_name() {
        let out = fill_copy("Dear {Name}", &HashMap::new(), "CF-1");
        assert_eq!(out, "Dear [Name]");
    }
}
