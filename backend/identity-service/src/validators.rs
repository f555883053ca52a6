//! Input validation rules for identity fields
//!
//! Each rule is a `validator` crate custom function: `Ok(())` when the value is
//! well formed, otherwise a `ValidationError` whose message lists every
//! violated condition joined with `" & "`. Lengths count Unicode scalar values.
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use unicode_properties::{GeneralCategory, GeneralCategoryGroup, UnicodeGeneralCategory};
use validator::{ValidationError, ValidationErrors};

const FULL_NAME_MIN: usize = 3;
const FULL_NAME_MAX: usize = 60;
const PHONE_NUMBER_MIN: usize = 10;
const PHONE_NUMBER_MAX: usize = 13;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 64;

/// Indonesian country code every phone number must start with
pub const PHONE_NUMBER_PREFIX: &str = "+62";

pub const FULL_NAME_LENGTH_MESSAGE: &str =
    "must be at minimum 3 characters and maximum 60 characters";
pub const PHONE_NUMBER_LENGTH_MESSAGE: &str =
    "must be minimum 10 characters and maximum 13 characters";
pub const PHONE_NUMBER_PREFIX_MESSAGE: &str = "must start with the Indonesia country code “+62”";
pub const PASSWORD_LENGTH_MESSAGE: &str = "must be minimum 6 characters and maximum 64 characters";
pub const PASSWORD_COMPOSITION_MESSAGE: &str = "must containing at least 1 capital characters AND 1 number AND 1 special (non alpha-numeric) characters";

const VIOLATION_SEPARATOR: &str = " & ";

fn violations(code: &'static str, messages: Vec<&'static str>) -> Result<(), ValidationError> {
    if messages.is_empty() {
        return Ok(());
    }

    Err(ValidationError::new(code).with_message(Cow::Owned(messages.join(VIOLATION_SEPARATOR))))
}

/// Full name: 3 to 60 characters
pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    let total = full_name.chars().count();

    if !(FULL_NAME_MIN..=FULL_NAME_MAX).contains(&total) {
        return violations("full_name", vec![FULL_NAME_LENGTH_MESSAGE]);
    }

    Ok(())
}

/// Phone number: 10 to 13 characters and the `+62` prefix
///
/// Values shorter than the prefix only report the length violation.
pub fn validate_phone_number(phone_number: &str) -> Result<(), ValidationError> {
    let total = phone_number.chars().count();
    let mut messages = Vec::new();

    if !(PHONE_NUMBER_MIN..=PHONE_NUMBER_MAX).contains(&total) {
        messages.push(PHONE_NUMBER_LENGTH_MESSAGE);
    }

    if total >= PHONE_NUMBER_PREFIX.len() && !phone_number.starts_with(PHONE_NUMBER_PREFIX) {
        messages.push(PHONE_NUMBER_PREFIX_MESSAGE);
    }

    violations("phone_number", messages)
}

/// Password: 6 to 64 characters with at least one number, one uppercase
/// letter (Lu) and one punctuation or symbol character (P* or S*)
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let mut total = 0;
    let (mut has_number, mut has_uppercase, mut has_special) = (false, false, false);

    for c in password.chars() {
        if c.is_numeric() {
            has_number = true;
        } else if c.general_category() == GeneralCategory::UppercaseLetter {
            has_uppercase = true;
        } else if is_punctuation_or_symbol(c) {
            has_special = true;
        }
        total += 1;
    }

    let mut messages = Vec::new();

    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&total) {
        messages.push(PASSWORD_LENGTH_MESSAGE);
    }

    if !(has_number && has_uppercase && has_special) {
        messages.push(PASSWORD_COMPOSITION_MESSAGE);
    }

    violations("password", messages)
}

fn is_punctuation_or_symbol(c: char) -> bool {
    matches!(
        c.general_category_group(),
        GeneralCategoryGroup::Punctuation | GeneralCategoryGroup::Symbol
    )
}

/// One rejected field, as serialised in a 400 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Field name to violation message; empty means the input is valid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome(BTreeMap<String, String>);

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.0
            .into_iter()
            .map(|(field, message)| FieldViolation { field, message })
            .collect()
    }
}

impl From<ValidationErrors> for ValidationOutcome {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|err| {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    (field.to_string(), message)
                })
            })
            .collect();

        Self(fields)
    }
}

/// Run `validator` and collapse the result into a `ValidationOutcome`
pub fn check<T: validator::Validate>(input: &T) -> ValidationOutcome {
    match input.validate() {
        Ok(()) => ValidationOutcome::default(),
        Err(errors) => errors.into(),
    }
}
