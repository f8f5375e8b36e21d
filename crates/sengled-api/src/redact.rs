//! Masking helpers so account identifiers and tokens never reach logs verbatim.

/// Mask an email address, keeping the first and last character of the
/// local part and the domain: `jane.doe@example.com` → `j******e@e*********m`.
///
/// Anything without an `@` is masked like a token.
pub fn hide_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            format!("{}@{}", mask_middle(local), mask_middle(domain))
        }
        _ => hide_token(email),
    }
}

/// Mask a secret-ish string, keeping the first character and the last
/// three when it is long enough to stay unguessable.
pub fn hide_token(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars.iter().take(1).collect();
    let tail: String = chars.iter().skip(chars.len() - 3).collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
}

fn mask_middle(part: &str) -> String {
    let chars: Vec<char> = part.chars().collect();
    match chars.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, middle @ .., last] => {
            format!("{first}{}{last}", "*".repeat(middle.len()))
        }
    }
}
