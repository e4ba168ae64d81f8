use crate::utils::error::{Result, SumoError};
use std::collections::HashSet;
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// The path must point at an existing regular file.
pub fn validate_existing_file(field_name: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.display().to_string(),
            reason: format!("provided {} file does not exist", field_name),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(SumoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_unique_names<'a, I>(field_name: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SumoError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Name is used more than once".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("config", "scenario/hello.sumocfg").is_ok());
        assert!(validate_path("config", "").is_err());
        assert!(validate_path("config", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_existing_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(validate_existing_file("config", file.path()).is_ok());

        let err = validate_existing_file("executable", Path::new("/this/path/does/not/exist"))
            .unwrap_err();
        assert!(err.to_string().contains("executable"));
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("connect_attempts", 5, 1).is_ok());
        assert!(validate_positive_number("connect_attempts", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("port", 8800u32, 1, 65535).is_ok());
        assert!(validate_range("port", 0u32, 1, 65535).is_err());
        assert!(validate_range("port", 70000u32, 1, 65535).is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("instances", ["a", "b"]).is_ok());
        assert!(validate_unique_names("instances", ["a", "b", "a"]).is_err());
    }
}
