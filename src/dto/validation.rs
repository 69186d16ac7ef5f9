//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_ADDRESS_LENGTH: usize = 64;

/// Validates that an address is a non-empty token without whitespace.
///
/// Addresses are stored exactly as the tracking endpoint normalised them, so they are not
/// required to parse as IP literals.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    if address.is_empty() || address.len() > MAX_ADDRESS_LENGTH {
        let mut err = ValidationError::new("address_length");
        err.message = Some(
            format!(
                "address must be between 1 and {MAX_ADDRESS_LENGTH} characters (got {})",
                address.len()
            )
            .into(),
        );
        return Err(err);
    }

    if address.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("address_format");
        err.message = Some("address must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates every entry of a batch of addresses.
pub fn validate_addresses(addresses: &[String]) -> Result<(), ValidationError> {
    addresses
        .iter()
        .try_for_each(|address| validate_address(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address_valid() {
        assert!(validate_address("1.2.3.4").is_ok());
        assert!(validate_address("2001:db8::1").is_ok());
        assert!(validate_address("unknown").is_ok());
    }

    #[test]
    fn test_validate_address_invalid() {
        assert!(validate_address("").is_err());
        assert!(validate_address("1.2.3.4 5.6.7.8").is_err());
        assert!(validate_address(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_addresses_stops_on_first_invalid() {
        assert!(validate_addresses(&["1.2.3.4".into(), "5.6.7.8".into()]).is_ok());
        assert!(validate_addresses(&["1.2.3.4".into(), " ".into()]).is_err());
    }
}
