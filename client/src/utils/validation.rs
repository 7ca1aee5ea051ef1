//! Validation of form input before it reaches the identity service

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
        }
    }

    /// First failure among `results`, or ok.
    pub fn first_error(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        results
            .into_iter()
            .find(|r| !r.is_valid)
            .unwrap_or_else(Self::ok)
    }
}

/// Validate email format
pub fn validate_email(email: &str) -> ValidationResult {
    let email = email.trim();
    if email.is_empty() {
        return ValidationResult::err("Email is required");
    }

    if !email.contains('@') {
        return ValidationResult::err("Invalid email format");
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return ValidationResult::err("Invalid email format");
    }

    if parts[0].is_empty() {
        return ValidationResult::err("Email username cannot be empty");
    }

    if parts[1].is_empty() || !parts[1].contains('.') {
        return ValidationResult::err("Invalid email domain");
    }

    ValidationResult::ok()
}

/// Validate password strength
pub fn validate_password(password: &str) -> ValidationResult {
    if password.is_empty() {
        return ValidationResult::err("Password is required");
    }

    if password.len() < 8 {
        return ValidationResult::err("Password must be at least 8 characters");
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_numeric());

    if !has_uppercase {
        return ValidationResult::err("Password must contain at least one uppercase letter");
    }

    if !has_lowercase {
        return ValidationResult::err("Password must contain at least one lowercase letter");
    }

    if !has_digit {
        return ValidationResult::err("Password must contain at least one number");
    }

    ValidationResult::ok()
}

/// Login only checks presence; strength rules apply to new passwords.
pub fn validate_login(email: &str, password: &str) -> ValidationResult {
    if email.trim().is_empty() || password.is_empty() {
        return ValidationResult::err("Email and password required");
    }
    validate_email(email)
}

/// Validate that the confirmation matches
pub fn validate_password_confirmation(password: &str, confirm: &str) -> ValidationResult {
    if password != confirm {
        return ValidationResult::err("Passwords don't match");
    }
    ValidationResult::ok()
}

/// Optional phone number: digits, spaces, dashes and a leading `+`
pub fn validate_phone(phone: Option<&str>) -> ValidationResult {
    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return ValidationResult::ok();
    };

    let digits = phone.trim_start_matches('+');
    if !digits.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return ValidationResult::err("Phone number can only contain digits, spaces and -");
    }
    if digits.chars().filter(|c| c.is_ascii_digit()).count() < 7 {
        return ValidationResult::err("Phone number is too short");
    }

    ValidationResult::ok()
}
