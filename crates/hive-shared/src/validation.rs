//! Local input checks run before any network call (and again server-side).

use chrono::{Datelike, NaiveDate};

use crate::constants::{
    INTEREST_CATALOG, MAX_BIO_LEN, MAX_DISPLAY_NAME_LEN, MAX_MESSAGE_LEN, MAX_PROFILE_INTERESTS,
    MAX_REPORT_DESCRIPTION_LEN,
};
use crate::error::ValidationError;

/// Trim and bound-check a display name.
pub fn validate_display_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::DisplayNameRequired);
    }
    let len = trimmed.chars().count();
    if len > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::DisplayNameTooLong {
            len,
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

pub fn validate_bio(bio: &str) -> Result<String, ValidationError> {
    let trimmed = bio.trim();
    let len = trimmed.chars().count();
    if len > MAX_BIO_LEN {
        return Err(ValidationError::BioTooLong {
            len,
            max: MAX_BIO_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// A profile needs between one and [`MAX_PROFILE_INTERESTS`] catalog interests.
pub fn validate_profile_interests(interests: &[String]) -> Result<(), ValidationError> {
    if interests.is_empty() {
        return Err(ValidationError::InterestsRequired);
    }
    if interests.len() > MAX_PROFILE_INTERESTS {
        return Err(ValidationError::TooManyInterests {
            count: interests.len(),
            max: MAX_PROFILE_INTERESTS,
        });
    }
    match interests
        .iter()
        .find(|i| !INTEREST_CATALOG.contains(&i.as_str()))
    {
        Some(unknown) => Err(ValidationError::UnknownInterest(unknown.clone())),
        None => Ok(()),
    }
}

/// Parse a `YYYY-MM-DD` date of birth.
pub fn parse_date_of_birth(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateOfBirth(value.to_string()))
}

/// Age in whole years on `today`. Zero for dates in the future.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn validate_message(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = content.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::TextTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

pub fn validate_report_description(description: Option<&str>) -> Result<(), ValidationError> {
    let Some(text) = description else {
        return Ok(());
    };
    let len = text.chars().count();
    if len > MAX_REPORT_DESCRIPTION_LEN {
        return Err(ValidationError::TextTooLong {
            len,
            max: MAX_REPORT_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

pub fn validate_rating(rating: u8) -> Result<(), ValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::InvalidRating(rating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_trimmed_and_bounded() {
        assert_eq!(validate_display_name("  Ana  ").unwrap(), "Ana");
        assert_eq!(
            validate_display_name("   "),
            Err(ValidationError::DisplayNameRequired)
        );
        assert!(validate_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_profile_interests() {
        assert_eq!(
            validate_profile_interests(&[]),
            Err(ValidationError::InterestsRequired)
        );
        let four: Vec<String> = ["Music", "Art", "Food", "Books"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(validate_profile_interests(&four).is_err());
        assert!(validate_profile_interests(&four[..3]).is_ok());
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), 19);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), 20);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()), 0);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert_eq!(validate_rating(0), Err(ValidationError::InvalidRating(0)));
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_message_rules() {
        assert_eq!(validate_message(" \n"), Err(ValidationError::EmptyMessage));
        assert!(validate_message("hey").is_ok());
    }
}
