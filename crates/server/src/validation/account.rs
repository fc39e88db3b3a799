//! Sign-up and profile field policies.

/// Longest address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 12;
pub const MAX_PASSWORD_LEN: usize = 64;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 20;

/// `local@domain.tld` with no whitespace, one `@`, and a dotted domain
/// made of non-empty labels.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace)
    {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

/// Returns the first rule the password breaks.
pub fn check_password(password: &str) -> Result<(), &'static str> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LEN {
        return Err("password must be at least 12 characters");
    }
    if length > MAX_PASSWORD_LEN {
        return Err("password must be at most 64 characters");
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("password must contain at least one letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("password must contain at least one digit");
    }
    if !password.chars().any(|c| c.is_ascii_punctuation()) {
        return Err("password must contain at least one special character");
    }
    Ok(())
}

pub fn is_valid_person_name(name: &str) -> bool {
    let length = name.trim().chars().count();
    (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("ada@example.org"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("ada@@example.org"));
        assert!(!is_valid_email("ada @example.org"));
        assert!(!is_valid_email("ada@example..org"));
        assert!(!is_valid_email(&format!("{}@example.org", "a".repeat(250))));
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password("Tr0ub4dor&3xyz").is_ok());
        assert_eq!(
            check_password("Sh0rt!"),
            Err("password must be at least 12 characters")
        );
        assert!(check_password("alllettersandno!").is_err());
        assert!(check_password("1234567890123!").is_err());
        assert!(check_password("NoSpecials12345").is_err());
        assert!(check_password(&format!("A1!{}", "x".repeat(70))).is_err());
    }

    #[test]
    fn test_person_names() {
        assert!(is_valid_person_name("Ada"));
        assert!(!is_valid_person_name("A"));
        assert!(!is_valid_person_name("   "));
        assert!(!is_valid_person_name("Bartholomew-Maximilian"));
    }
}
