//! Search filters attached to a matchmaking queue entry.

use serde::{Deserialize, Serialize};

use crate::constants::{GENDER_ANY, GENDER_OPTIONS, INTEREST_CATALOG, MAX_AGE, MAX_FILTER_INTERESTS, MIN_AGE};
use crate::error::ValidationError;

/// Preferences a searching user declares. Every field is optional; an empty
/// filter set matches anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub interests: Vec<String>,
    pub genders: Vec<String>,
    /// Inclusive `[min, max]` age bounds.
    pub age_range: Option<[u8; 2]>,
}

/// The profile attributes a filter is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateProfile {
    pub gender: Option<String>,
    pub age: Option<u32>,
}

impl SearchFilters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interests.len() > MAX_FILTER_INTERESTS {
            return Err(ValidationError::TooManyInterests {
                count: self.interests.len(),
                max: MAX_FILTER_INTERESTS,
            });
        }
        if let Some(unknown) = self
            .interests
            .iter()
            .find(|i| !INTEREST_CATALOG.contains(&i.as_str()))
        {
            return Err(ValidationError::UnknownInterest(unknown.clone()));
        }
        if let Some(unknown) = self
            .genders
            .iter()
            .find(|g| !GENDER_OPTIONS.contains(&g.as_str()))
        {
            return Err(ValidationError::UnknownGender(unknown.clone()));
        }
        if let Some([min, max]) = self.age_range {
            if min < MIN_AGE || max > MAX_AGE || min > max {
                return Err(ValidationError::InvalidAgeRange { min, max });
            }
        }
        Ok(())
    }

    /// Hard constraints only. Interests never exclude a candidate, and a
    /// candidate missing a profile field passes the matching check.
    pub fn accepts(&self, candidate: &CandidateProfile) -> bool {
        let gender_ok = if self.genders.is_empty() || self.genders.iter().any(|g| g == GENDER_ANY) {
            true
        } else {
            match &candidate.gender {
                Some(gender) => self.genders.iter().any(|g| g.eq_ignore_ascii_case(gender)),
                None => true,
            }
        };

        let age_ok = match (self.age_range, candidate.age) {
            (Some([min, max]), Some(age)) => (min as u32..=max as u32).contains(&age),
            _ => true,
        };

        gender_ok && age_ok
    }

    /// Both users' filters must accept the other.
    pub fn mutually_compatible(
        a: (&SearchFilters, &CandidateProfile),
        b: (&SearchFilters, &CandidateProfile),
    ) -> bool {
        a.0.accepts(b.1) && b.0.accepts(a.1)
    }

    pub fn shared_interests<'a>(&'a self, other: &[String]) -> Vec<&'a str> {
        self.interests
            .iter()
            .filter(|i| other.contains(i))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(gender: Option<&str>, age: Option<u32>) -> CandidateProfile {
        CandidateProfile {
            gender: gender.map(String::from),
            age,
        }
    }

    #[test]
    fn test_empty_filters_accept_anyone() {
        let filters = SearchFilters::default();
        assert!(filters.validate().is_ok());
        assert!(filters.accepts(&candidate(Some("Female"), Some(44))));
        assert!(filters.accepts(&candidate(None, None)));
    }

    #[test]
    fn test_deserializes_client_shape() {
        let filters: SearchFilters = serde_json::from_str(
            r#"{"interests":["Music"],"genders":["All"],"ageRange":[18,30]}"#,
        )
        .unwrap();
        assert_eq!(filters.interests, vec!["Music".to_string()]);
        assert_eq!(filters.age_range, Some([18, 30]));

        let partial: SearchFilters = serde_json::from_str(r#"{"interests":["Music"]}"#).unwrap();
        assert!(partial.genders.is_empty());
        assert!(partial.age_range.is_none());
    }

    #[test]
    fn test_validation_limits() {
        let too_young = SearchFilters {
            age_range: Some([16, 30]),
            ..Default::default()
        };
        assert_eq!(
            too_young.validate(),
            Err(ValidationError::InvalidAgeRange { min: 16, max: 30 })
        );

        let inverted = SearchFilters {
            age_range: Some([40, 30]),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let unknown = SearchFilters {
            interests: vec!["Knitting".into()],
            ..Default::default()
        };
        assert_eq!(
            unknown.validate(),
            Err(ValidationError::UnknownInterest("Knitting".into()))
        );

        let bad_gender = SearchFilters {
            genders: vec!["Robot".into()],
            ..Default::default()
        };
        assert!(bad_gender.validate().is_err());
    }

    #[test]
    fn test_gender_and_age_constraints() {
        let filters = SearchFilters {
            genders: vec!["Female".into(), "Non-binary".into()],
            age_range: Some([20, 25]),
            ..Default::default()
        };
        assert!(filters.accepts(&candidate(Some("female"), Some(22))));
        assert!(!filters.accepts(&candidate(Some("Male"), Some(22))));
        assert!(!filters.accepts(&candidate(Some("Female"), Some(30))));
        assert!(filters.accepts(&candidate(None, None)));
    }

    #[test]
    fn test_interests_never_exclude() {
        let music = SearchFilters {
            interests: vec!["Music".into()],
            ..Default::default()
        };
        let none = SearchFilters::default();
        assert!(SearchFilters::mutually_compatible(
            (&music, &candidate(None, None)),
            (&none, &candidate(Some("Male"), Some(19))),
        ));
    }

    #[test]
    fn test_mutual_check_is_symmetric() {
        let only_male = SearchFilters {
            genders: vec!["Male".into()],
            ..Default::default()
        };
        let anyone = SearchFilters::default();
        let female = candidate(Some("Female"), None);
        let male = candidate(Some("Male"), None);

        assert!(!SearchFilters::mutually_compatible((&only_male, &male), (&anyone, &female)));
        assert!(!SearchFilters::mutually_compatible((&anyone, &female), (&only_male, &male)));
        assert!(SearchFilters::mutually_compatible((&only_male, &female), (&anyone, &male)));
    }
}
