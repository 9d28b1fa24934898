//! Shape and content checks for signup submissions.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Language, NewParticipant};

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Raw submission body. Every field is kept as untyped JSON so that type
/// mistakes are reported per field rather than as one decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    pub email: Option<Value>,
    #[serde(rename = "firstName")]
    pub first_name: Option<Value>,
    #[serde(rename = "lastName")]
    pub last_name: Option<Value>,
    pub alcohol: Option<Value>,
    #[serde(rename = "tableGroup")]
    pub table_group: Option<Value>,
    pub diet: Option<Value>,
    pub avec: Option<Value>,
    pub organisation: Option<Value>,
    pub alumni: Option<Value>,
    pub gift: Option<Value>,
    pub sillis: Option<Value>,
    pub invited: Option<Value>,
    pub language: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub location: &'static str,
    pub param: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub participant: NewParticipant,
    pub language: Language,
}

struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, param: &'static str, msg: &str, value: Option<&Value>) {
        self.errors.push(FieldError {
            location: "body",
            param,
            msg: msg.to_string(),
            value: value.cloned(),
        });
    }

    fn required_text(&mut self, param: &'static str, value: Option<&Value>, max_len: usize) -> String {
        match value {
            Some(Value::String(s)) if s.trim().is_empty() => self.fail(param, "Must not be empty", value),
            Some(Value::String(s)) if s.chars().count() > max_len => {
                self.fail(param, &format!("At most {} characters", max_len), value)
            }
            Some(Value::String(s)) => return s.trim().to_string(),
            Some(Value::Null) | None => self.fail(param, "Required", value),
            Some(_) => self.fail(param, "Must be a string", value),
        }
        String::new()
    }

    fn optional_text(&mut self, param: &'static str, value: Option<&Value>, max_len: usize) -> Option<String> {
        match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.chars().count() > max_len => {
                self.fail(param, &format!("At most {} characters", max_len), value);
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.fail(param, "Must be a string", value);
                None
            }
        }
    }

    /// `"yes"` means true, any other string false; JSON booleans are taken as is.
    fn yes_no(&mut self, param: &'static str, value: Option<&Value>, required: bool) -> bool {
        match value {
            Some(Value::String(s)) if required && s.is_empty() => {
                self.fail(param, "Must not be empty", value);
                false
            }
            Some(Value::String(s)) => s == "yes",
            Some(Value::Bool(b)) => *b,
            None | Some(Value::Null) if required => {
                self.fail(param, "Required", value);
                false
            }
            None | Some(Value::Null) => false,
            Some(_) => {
                self.fail(param, "Must be \"yes\" or \"no\"", value);
                false
            }
        }
    }
}

impl SignupForm {
    pub fn validate(&self) -> Result<Submission, Vec<FieldError>> {
        let mut check = Checker { errors: Vec::new() };

        let email = match self.email.as_ref().and_then(Value::as_str).map(str::trim) {
            Some(s) if email_pattern().is_match(s) && s.len() <= 255 => s.to_string(),
            _ => {
                check.fail("email", "Invalid email", self.email.as_ref());
                String::new()
            }
        };
        let firstname = check.required_text("firstName", self.first_name.as_ref(), 50);
        let lastname = check.required_text("lastName", self.last_name.as_ref(), 50);
        let alcohol = check.yes_no("alcohol", self.alcohol.as_ref(), true);
        let table_group = check.optional_text("tableGroup", self.table_group.as_ref(), 1000);
        let diet = check.optional_text("diet", self.diet.as_ref(), 1000);
        let avec = check.optional_text("avec", self.avec.as_ref(), 100);
        let organisation = check.optional_text("organisation", self.organisation.as_ref(), 255);
        let alumni = check.yes_no("alumni", self.alumni.as_ref(), false);
        let gift = check.yes_no("gift", self.gift.as_ref(), false);
        let sillis = check.yes_no("sillis", self.sillis.as_ref(), false);
        let invited = match self.invited.as_ref() {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            other => {
                check.fail("invited", "Must be a boolean", other);
                false
            }
        };
        let language = Language::from_code(self.language.as_ref().and_then(Value::as_str));

        if !check.errors.is_empty() {
            return Err(check.errors);
        }

        Ok(Submission {
            participant: NewParticipant {
                firstname,
                lastname,
                email,
                diet,
                alcohol,
                table_group,
                avec,
                organisation,
                gift,
                invited,
                alumni,
                sillis,
            },
            language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(body: Value) -> SignupForm {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_minimal_submission_defaults_flags() {
        let submission = form(json!({
            "email": "matti@example.com",
            "firstName": "Matti",
            "lastName": "Meikäläinen",
            "alcohol": "yes"
        }))
        .validate()
        .unwrap();

        let p = submission.participant;
        assert_eq!(p.firstname, "Matti");
        assert!(p.alcohol);
        assert!(!p.gift && !p.alumni && !p.sillis && !p.invited);
        assert_eq!(p.diet, None);
        assert_eq!(submission.language, Language::En);
    }

    #[test]
    fn test_full_submission() {
        let submission = form(json!({
            "email": "liisa@example.com",
            "firstName": "Liisa",
            "lastName": "Laine",
            "alcohol": "no",
            "tableGroup": "Board",
            "diet": "gluten free",
            "avec": "Pekka",
            "organisation": "Alumni association",
            "gift": "yes",
            "alumni": true,
            "sillis": "no",
            "invited": true,
            "language": "fi"
        }))
        .validate()
        .unwrap();

        let p = submission.participant;
        assert!(!p.alcohol);
        assert!(p.gift && p.alumni && p.invited);
        assert!(!p.sillis);
        assert_eq!(p.table_group.as_deref(), Some("Board"));
        assert_eq!(submission.language, Language::Fi);
    }

    #[test]
    fn test_reports_every_bad_field() {
        let errors = form(json!({
            "email": "not-an-email",
            "firstName": "",
            "alcohol": 3,
            "invited": "yes"
        }))
        .validate()
        .unwrap_err();

        let params: Vec<_> = errors.iter().map(|e| e.param).collect();
        assert_eq!(params, vec!["email", "firstName", "lastName", "alcohol", "invited"]);
        assert!(errors.iter().all(|e| e.location == "body"));
    }

    #[test]
    fn test_email_length_counts_trimmed_address() {
        let address = format!("{}@example.com", "a".repeat(240));
        let submission = form(json!({
            "email": format!("  {}  ", address),
            "firstName": "Aino",
            "lastName": "Aalto",
            "alcohol": "no"
        }))
        .validate()
        .unwrap();
        assert_eq!(submission.participant.email, address);

        let errors = form(json!({
            "email": format!("{}@example.com", "a".repeat(250)),
            "firstName": "Aino",
            "lastName": "Aalto",
            "alcohol": "no"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(errors[0].param, "email");
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let errors = form(json!({
            "email": "a@b.fi",
            "firstName": "x".repeat(51),
            "lastName": "y",
            "alcohol": "yes"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "firstName");
    }
}
