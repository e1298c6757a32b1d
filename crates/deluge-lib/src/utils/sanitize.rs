/// Convert a user-provided profile name into a folder name that is safe on
/// every platform the game runs on.
///
/// Case is preserved; characters that Windows or Linux reject in path
/// components are replaced with `_`.
pub fn sanitize_profile_name(name: &str) -> String {
    let trimmed = name.trim();
    let mut out = String::with_capacity(trimmed.len());

    for ch in trimmed.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => out.push('_'),
            c if c.is_control() => out.push('_'),
            c => out.push(c),
        }
    }

    // Windows silently strips trailing dots and spaces
    let cleaned = out.trim_end_matches(['.', ' ']);

    if cleaned.is_empty() {
        "profile".to_string()
    } else {
        cleaned.to_string()
    }
}
