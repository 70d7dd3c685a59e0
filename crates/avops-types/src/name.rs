//! Name handling shared by every name-keyed entity.
//!
//! Agents, recipes and workflows are looked up by human-readable name, and
//! names are unique case-insensitively. `normalize_name` is the stored form,
//! `name_key` is the comparison form.

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive comparison key for a name.
pub fn name_key(raw: &str) -> String {
    normalize_name(raw).to_lowercase()
}

/// File-name safe slug: lowercase ASCII alphanumerics separated by single
/// hyphens. Falls back to `"item"` when nothing survives.
pub fn slugify(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_hyphen = true; // treat start as hyphen to trim leading
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    if result.is_empty() {
        "item".to_string()
    } else {
        result
    }
}
