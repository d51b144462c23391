//! Storage key generation
//!
//! Keys have the shape `{prefix}/{user_id}/{timestamp}-{token}-{name}`.
//! The millisecond timestamp plus a random token makes concurrent uploads
//! of identically-named files collision-resistant, and the timestamp is
//! what the orphan reclaimer later parses to enforce its grace window.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Replace every character outside `[a-zA-Z0-9._-]`, drop path components,
/// and cap the stem length while preserving the extension.
pub fn sanitize_file_name(file_name: &str, max_stem: usize) -> String {
    // Only the final path component matters; this also collapses `../`
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let clean: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let clean = clean.trim_matches('.').to_string();

    let (stem, ext) = match clean.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() && !e.is_empty() => (s.to_string(), Some(e.to_string())),
        _ => (clean, None),
    };

    let mut stem: String = stem.chars().take(max_stem).collect();
    if stem.is_empty() {
        stem = "file".to_string();
    }

    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

fn sanitize_segment(segment: &str) -> String {
    // Dots are mapped away too, so a hostile user id can never form a
    // `..` segment.
    let clean: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.is_empty() {
        "anonymous".to_string()
    } else {
        clean
    }
}

/// Generate a collision-resistant storage key for a file scoped to a user
/// namespace. Never fails; the output is always a syntactically valid key.
pub fn generate_storage_path(prefix: &str, user_id: &str, file_name: &str, max_stem: usize) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}/{}-{}-{}",
        prefix.trim_matches('/'),
        sanitize_segment(user_id),
        timestamp,
        &token[..8],
        sanitize_file_name(file_name, max_stem)
    )
}

/// Recover the upload timestamp embedded in a generated key. Returns
/// `None` for keys this subsystem did not generate.
pub fn parse_upload_timestamp(key: &str) -> Option<DateTime<Utc>> {
    let file_part = key.rsplit('/').next()?;
    let (millis_str, _) = file_part.split_once('-')?;
    let millis: i64 = millis_str.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_file_name("my photo (1).png", 80), "my_photo__1_.png");
        assert_eq!(sanitize_file_name("café.jpg", 80), "caf_.jpg");
        assert_eq!(sanitize_file_name("no-change_ok.webp", 80), "no-change_ok.webp");
    }

    #[test]
    fn test_sanitize_collapses_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd", 80), "passwd");
        assert_eq!(sanitize_file_name("/absolute/path.png", 80), "path.png");
        assert_eq!(sanitize_file_name("..\\windows\\evil.png", 80), "evil.png");
    }

    #[test]
    fn test_sanitize_caps_stem_but_keeps_extension() {
        let long = format!("{}.png", "a".repeat(200));
        let out = sanitize_file_name(&long, 80);
        assert!(out.ends_with(".png"));
        assert_eq!(out.len(), 84);
    }

    #[test]
    fn test_sanitize_never_returns_empty() {
        assert_eq!(sanitize_file_name("", 80), "file");
        assert_eq!(sanitize_file_name("...", 80), "file");
        assert_eq!(sanitize_file_name("///", 80), "file");
    }

    #[test]
    fn test_generated_path_shape() {
        let path = generate_storage_path("gallery", "user-1", "party pic.png", 80);
        // The random token forces pattern matching rather than equality
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "gallery");
        assert_eq!(parts[1], "user-1");

        let file = parts[2];
        let mut segments = file.splitn(3, '-');
        let millis: i64 = segments.next().unwrap().parse().unwrap();
        assert!(millis > 0);
        let token = segments.next().unwrap();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(segments.next().unwrap(), "party_pic.png");
    }

    #[test]
    fn test_path_never_escapes_namespace() {
        let path = generate_storage_path("gallery", "../sneaky", "../../x (1).png", 80);
        assert!(path.starts_with("gallery/"));
        assert!(!path.contains(".."));
        assert!(!path.contains(' '));
        assert!(!path.contains('('));
        assert_eq!(path.split('/').count(), 3);
    }

    #[test]
    fn test_concurrent_same_name_paths_differ() {
        let a = generate_storage_path("gallery", "u", "same.png", 80);
        let b = generate_storage_path("gallery", "u", "same.png", 80);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_upload_timestamp_round_trip() {
        let before = Utc::now().timestamp_millis();
        let path = generate_storage_path("gallery", "u", "x.png", 80);
        let parsed = parse_upload_timestamp(&path).unwrap();
        assert!(parsed.timestamp_millis() >= before);
        assert!(parse_upload_timestamp("gallery/u/not-generated.png").is_none());
        assert!(parse_upload_timestamp("").is_none());
    }
}
