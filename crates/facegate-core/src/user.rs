//! Username normalization.
//!
//! Usernames key remote directories, so "Alice" and "alice" must land in the
//! same place. Applied at every entry point that accepts a username.

/// Trim and lowercase a username. Returns `None` for an empty result or one
/// that could escape a path-addressed layout.
pub fn normalize(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return None;
    }
    if name.chars().all(|c| c == '.') {
        return None;
    }
    Some(name)
}
