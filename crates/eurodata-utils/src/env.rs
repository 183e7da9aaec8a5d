//! Environment-variable helpers

/// Value of `key`, or `None` when unset or blank
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Boolean switch; "0", "false", "off" and "no" are false, any other value is true
pub fn env_flag(key: &str) -> Option<bool> {
    env_opt(key).map(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}
