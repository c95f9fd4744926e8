//! Form-field validation helpers.
//!
//! Submit handlers collect every failure into a `Vec<FieldError>` before
//! rejecting, so the client sees all problems at once rather than the first.

use regex::Regex;
use serde::Serialize;

/// Optional leading `+`, then digits, spaces, dashes, parens. 7-20 chars.
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9\-\(\) ]{5,18}$";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A required text field must be present and non-blank.
pub fn require(errors: &mut Vec<FieldError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
    }
}

/// At least one genre, none of them blank.
pub fn validate_genres(errors: &mut Vec<FieldError>, genres: &[String]) {
    if genres.is_empty() {
        errors.push(FieldError::new("genres", "at least one genre is required"));
    } else if genres.iter().any(|g| g.trim().is_empty()) {
        errors.push(FieldError::new("genres", "genres must not be blank"));
    }
}

/// Phone numbers are free-form but must match the directory pattern.
pub fn validate_phone(errors: &mut Vec<FieldError>, field: &'static str, phone: Option<&str>) {
    let Some(phone) = phone else { return };
    let re = Regex::new(PHONE_PATTERN).expect("phone pattern is valid");
    if !re.is_match(phone) {
        errors.push(FieldError::new(
            field,
            format!("'{phone}' is not a valid phone number"),
        ));
    }
}

/// Link fields must parse as http(s) URLs when present.
pub fn validate_url(errors: &mut Vec<FieldError>, field: &'static str, value: Option<&str>) {
    let Some(value) = value else { return };
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        _ => errors.push(FieldError::new(
            field,
            format!("'{value}' is not a valid URL"),
        )),
    }
}

/// The seeking flag is derived from the description on every write:
/// a non-blank description means the record is actively seeking.
pub fn has_seeking(description: Option<&str>) -> bool {
    description.is_some_and(|d| !d.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_blank_field() {
        let mut errors = vec![];
        require(&mut errors, "name", "   ");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[0].message, "name is required");
    }

    #[test]
    fn test_require_present_field() {
        let mut errors = vec![];
        require(&mut errors, "name", "The Musical Hop");
        assert!(errors.is_empty());
    }

    #[test]
    fn test_genres_empty_list() {
        let mut errors = vec![];
        validate_genres(&mut errors, &[]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "genres");
    }

    #[test]
    fn test_genres_blank_entry() {
        let mut errors = vec![];
        validate_genres(&mut errors, &["Jazz".into(), " ".into()]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_genres_ok() {
        let mut errors = vec![];
        validate_genres(&mut errors, &["Jazz".into(), "Reggae".into()]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_phone_formats() {
        let mut errors = vec![];
        validate_phone(&mut errors, "phone", Some("123-123-1234"));
        validate_phone(&mut errors, "phone", Some("+1 (415) 386-1234"));
        validate_phone(&mut errors, "phone", None);
        assert!(errors.is_empty());

        validate_phone(&mut errors, "phone", Some("not a phone"));
        assert_eq!(errors.len(), 1);
        validate_phone(&mut errors, "phone", Some("12"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_url_formats() {
        let mut errors = vec![];
        validate_url(&mut errors, "facebook_link", Some("https://www.facebook.com/TheMusicalHop"));
        validate_url(&mut errors, "website", Some("http://themusicalhop.com"));
        validate_url(&mut errors, "website", None);
        assert!(errors.is_empty());

        validate_url(&mut errors, "facebook_link", Some("not-a-url"));
        assert_eq!(errors.len(), 1);
        validate_url(&mut errors, "website", Some("ftp://example.com/file"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_has_seeking() {
        assert!(!has_seeking(None));
        assert!(!has_seeking(Some("")));
        assert!(!has_seeking(Some("   ")));
        assert!(has_seeking(Some("Looking for a local band")));
    }

    #[test]
    fn test_field_error_serialization() {
        let err = FieldError::new("state", "state is required");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["field"], "state");
        assert_eq!(json["message"], "state is required");
    }
}
