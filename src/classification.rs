use crate::schema::{AccountClass, AccountLevel};

const CODE_SEPARATORS: [char; 3] = ['.', ' ', '-'];

/// Strips separators so that "11.05.05", "11 05 05" and "110505" compare equal.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| !CODE_SEPARATORS.contains(c))
        .collect()
}

pub fn is_numeric_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_digit())
}

/// Class of a normalized code. Empty codes and unexpected leading characters map
/// to `Unknown`.
pub fn classify(code: &str) -> AccountClass {
    code.chars()
        .next()
        .map(AccountClass::from_digit)
        .unwrap_or(AccountClass::Unknown)
}

pub fn level_for_code(code: &str) -> AccountLevel {
    match code.len() {
        1 => AccountLevel::Class,
        2 => AccountLevel::Group,
        4 => AccountLevel::Account,
        6 => AccountLevel::Subaccount,
        _ => AccountLevel::Auxiliary,
    }
}
