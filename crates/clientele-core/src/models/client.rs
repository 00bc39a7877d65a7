//! Client domain model: the customer records a tenant manages.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::account::normalize_email;

const MAX_NAME_LEN: usize = 100;
const MAX_TITLE_LEN: usize = 20;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PHONE_LEN: usize = 20;
const MAX_ADDRESS_LEN: usize = 200;

/// A client record owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(flatten)]
    pub details: ClientDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The editable part of a client. Create and update both take the full
/// set; an update replaces every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientDetails {
    /// Salutation such as `Mr` or `Dr`. Empty when none was given.
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub street: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub post_code: Option<String>,
}

impl ClientDetails {
    /// Trim every field, lowercase the email and turn blank address
    /// parts into `None`.
    pub fn normalized(self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            title: self.title.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(&self.email),
            phone: self.phone.trim().to_string(),
            date_of_birth: self.date_of_birth,
            street: blank_to_none(self.street),
            suburb: blank_to_none(self.suburb),
            state: blank_to_none(self.state),
            post_code: blank_to_none(self.post_code),
        }
    }

    /// Check required fields and lengths. All problems are reported in
    /// one `Validation` error.
    pub fn validate(&self) -> CoreResult<()> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            } else if value.chars().count() > MAX_NAME_LEN {
                problems.push(format!("{field} cannot exceed {MAX_NAME_LEN} characters"));
            }
        }

        if self.title.chars().count() > MAX_TITLE_LEN {
            problems.push(format!("title cannot exceed {MAX_TITLE_LEN} characters"));
        }

        if !looks_like_email(&self.email) {
            problems.push("a valid email address is required".into());
        } else if self.email.chars().count() > MAX_EMAIL_LEN {
            problems.push(format!("email cannot exceed {MAX_EMAIL_LEN} characters"));
        }

        if self.phone.chars().count() > MAX_PHONE_LEN {
            problems.push(format!("phone cannot exceed {MAX_PHONE_LEN} characters"));
        } else if !self
            .phone
            .chars()
            .all(|c| c.is_ascii_digit() || " +-().".contains(c))
        {
            problems.push("phone may only contain digits, spaces and + - ( ) .".into());
        }

        for (field, value) in [
            ("street", &self.street),
            ("suburb", &self.suburb),
            ("state", &self.state),
            ("post code", &self.post_code),
        ] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_ADDRESS_LEN) {
                problems.push(format!("{field} cannot exceed {MAX_ADDRESS_LEN} characters"));
            }
        }

        if let Some(born) = self.date_of_birth {
            if born > Utc::now().date_naive() {
                problems.push("date of birth cannot be in the future".into());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::validation(problems.join("; ")))
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
