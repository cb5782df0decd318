use crate::utils::error::{AntaError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(AntaError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| AntaError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AntaError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("max_concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let username = Some("admin".to_string());
        assert_eq!(validate_required_field("username", &username).unwrap(), "admin");
        let missing: Option<String> = None;
        assert!(matches!(
            validate_required_field("password", &missing),
            Err(AntaError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("anta_inventory.hosts.host", "leaf1").is_ok());
        assert!(validate_non_empty_string("anta_inventory.hosts.host", "  ").is_err());
    }
}
