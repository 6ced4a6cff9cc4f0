//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::player::normalize_username;

/// Validates a chat handle: optional leading `@`, then 5 to 32 letters, digits or underscores.
///
/// # Examples
///
/// ```ignore
/// validate_username("@Dana_K")  // Ok
/// validate_username("abc")      // Err - too short
/// validate_username("dana-k")   // Err - dash
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    normalize_username(username).map(|_| ()).map_err(|err| {
        let mut error = ValidationError::new("username_format");
        error.message = Some(err.to_string().into());
        error
    })
}

/// Validates a platform user id.
pub fn validate_user_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        let mut err = ValidationError::new("user_id_range");
        err.message = Some(format!("user id must be positive (got {id})").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("dana_k").is_ok());
        assert!(validate_username("@Dana_K").is_ok());
        assert!(validate_username("player_12345").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("abc").is_err()); // too short
        assert!(validate_username("dana-k").is_err()); // dash
        assert!(validate_username(&"x".repeat(33)).is_err()); // too long
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(1).is_ok());
        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(-5).is_err());
    }
}
