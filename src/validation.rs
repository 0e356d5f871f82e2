//! Account address validation for user and config input

use crate::game::types::Account;

const ADDRESS_HEX_LEN: usize = 40;

/// Account validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Account address is empty")]
    Empty,

    #[error("Account address must start with 0x")]
    MissingPrefix,

    #[error("Account address must have {expected} hex digits after 0x (found {found})")]
    WrongLength { expected: usize, found: usize },

    #[error("Account address contains non-hex characters: {chars}")]
    InvalidCharacters { chars: String },
}

/// Parse a ledger address (`0x` + 40 hex digits), normalizing to lowercase.
///
/// Surrounding whitespace is ignored; mixed-case (checksummed) input is accepted
/// but the checksum itself is not verified.
pub fn parse_account(input: &str) -> Result<Account, AccountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AccountError::Empty);
    }
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or(AccountError::MissingPrefix)?;

    let bad: String = digits.chars().filter(|c| !c.is_ascii_hexdigit()).collect();
    if !bad.is_empty() {
        return Err(AccountError::InvalidCharacters { chars: bad });
    }
    if digits.len() != ADDRESS_HEX_LEN {
        return Err(AccountError::WrongLength {
            expected: ADDRESS_HEX_LEN,
            found: digits.len(),
        });
    }
    Ok(Account::from_normalized(format!(
        "0x{}",
        digits.to_ascii_lowercase()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_lowercases_checksummed_address() {
        let acct = parse_account("  0xAbCdEf0123456789abcdef0123456789ABCDEF01 ").unwrap();
        assert_eq!(acct.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(parse_account(""), Err(AccountError::Empty));
        assert_eq!(
            parse_account("abcdef0123456789abcdef0123456789abcdef01"),
            Err(AccountError::MissingPrefix)
        );
        assert!(matches!(
            parse_account("0x1234"),
            Err(AccountError::WrongLength { found: 4, .. })
        ));
        assert!(matches!(
            parse_account("0xzz34567890123456789012345678901234567890"),
            Err(AccountError::InvalidCharacters { .. })
        ));
    }
}
