//! Request validation.
//!
//! Each request type checks its fields in declaration order and reports the
//! first failure as `AppError::Validation`. Emails come out trimmed and
//! lowercased.

use email_address::EmailAddress;
use gatehouse_core::models::auth::{
    AccountDetails, AccountStatus, AppMembership, Permission, ProfileUpdate, UserPatch,
};

use crate::error::{AppError, AppResult};
use crate::models::{
    AccountStatusRequest, AppMembershipRequest, CreateAccountRequest, ForgotPasswordRequest,
    LoginRequest, ProfileUpdateRequest, RemoveAppRequest, ResetPasswordRequest, SignupRequest,
    UserUpdateRequest,
};

const MIN_PASSWORD_LEN: usize = 8;
const MIN_NAME_LEN: usize = 2;

const WEAK_PASSWORD: &str = "Password must be at least 8 characters with an upper case character, \
                             lower case character, symbol and digit.";

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

/// Non-blank value, trimmed.
pub fn required(value: &str, message: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(message));
    }
    Ok(value.to_string())
}

pub fn email(value: &str) -> AppResult<String> {
    let value = required(value, "Email is required")?;
    if !EmailAddress::is_valid(&value) {
        return Err(invalid("Invalid email"));
    }
    Ok(value.to_lowercase())
}

/// At least two characters. `field` is the human name, e.g. "First name".
pub fn name(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.chars().count() < MIN_NAME_LEN {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub fn strong_password(value: &str, missing: &str) -> AppResult<String> {
    if value.is_empty() {
        return Err(invalid(missing));
    }
    let strong = value.chars().count() >= MIN_PASSWORD_LEN
        && value.chars().any(char::is_uppercase)
        && value.chars().any(char::is_lowercase)
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if !strong {
        return Err(invalid(WEAK_PASSWORD));
    }
    Ok(value.to_string())
}

pub fn permission(value: &str) -> AppResult<Permission> {
    required(value, "Permission is required")?
        .to_uppercase()
        .parse()
        .map_err(invalid)
}

pub fn account_status(value: &str) -> AppResult<AccountStatus> {
    required(value, "Account status is required")?
        .parse()
        .map_err(invalid)
}

// ---------------------------------------------------------------------------
// Per-request rules
// ---------------------------------------------------------------------------

/// Converts a raw request body into the validated value handed to the
/// service.
pub trait Validate {
    type Output;

    fn validate(self) -> AppResult<Self::Output>;
}

impl Validate for SignupRequest {
    type Output = AccountDetails;

    fn validate(self) -> AppResult<AccountDetails> {
        Ok(AccountDetails {
            first_name: name(&self.first_name, "First name")?,
            last_name: name(&self.last_name, "Last name")?,
            email: email(&self.email)?,
            password: strong_password(&self.password, "Password is required")?,
        })
    }
}

impl Validate for CreateAccountRequest {
    type Output = (AccountDetails, Permission, String, String);

    fn validate(self) -> AppResult<Self::Output> {
        let details = SignupRequest {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password: self.password,
        }
        .validate()?;
        let permission = permission(&self.permission)?;
        Ok((
            details,
            permission,
            self.app_label.trim().to_string(),
            self.app_address.trim().to_string(),
        ))
    }
}

impl Validate for LoginRequest {
    type Output = LoginRequest;

    /// Strength rules are not applied here; a weak stored password must
    /// still be able to log in.
    fn validate(self) -> AppResult<LoginRequest> {
        let email = email(&self.email)?;
        required(&self.password, "Password is required")?;
        Ok(LoginRequest {
            email,
            password: self.password,
            redirect_url: required(&self.redirect_url, "Redirect URL is required")?,
            redirect_app_id: required(&self.redirect_app_id, "Redirect App ID is required")?,
        })
    }
}

impl Validate for ProfileUpdateRequest {
    type Output = ProfileUpdate;

    /// Only supplied fields are checked.
    fn validate(self) -> AppResult<ProfileUpdate> {
        Ok(ProfileUpdate {
            first_name: self
                .first_name
                .map(|v| name(&v, "First name"))
                .transpose()?,
            last_name: self
                .last_name
                .map(|v| name(&v, "Last name"))
                .transpose()?,
            email: self.email.map(|v| email(&v)).transpose()?,
        })
    }
}

impl Validate for UserUpdateRequest {
    type Output = UserPatch;

    fn validate(self) -> AppResult<UserPatch> {
        Ok(UserPatch {
            first_name: Some(name(&self.first_name, "First name")?),
            last_name: Some(name(&self.last_name, "Last name")?),
            email: Some(email(&self.email)?),
            account_status: Some(account_status(&self.account_status)?),
        })
    }
}

impl Validate for AccountStatusRequest {
    type Output = (String, AccountStatus);

    fn validate(self) -> AppResult<Self::Output> {
        Ok((
            required(&self.user_id, "User ID is required")?,
            account_status(&self.account_status)?,
        ))
    }
}

impl Validate for AppMembershipRequest {
    type Output = (String, AppMembership);

    fn validate(self) -> AppResult<Self::Output> {
        let user_id = required(&self.user_id, "User ID is required")?;
        let app_id = required(&self.app_id, "App ID is required")?;
        let permission = permission(&self.permission)?;
        let mut membership = AppMembership::new(app_id, permission);
        membership.app_label = self.app_label.trim().to_string();
        membership.app_address = self.app_address.trim().to_string();
        Ok((user_id, membership))
    }
}

impl Validate for RemoveAppRequest {
    type Output = (String, String);

    fn validate(self) -> AppResult<Self::Output> {
        Ok((
            required(&self.user_id, "User ID is required")?,
            required(&self.app_id, "App ID is required")?,
        ))
    }
}

impl Validate for ForgotPasswordRequest {
    type Output = ForgotPasswordRequest;

    fn validate(self) -> AppResult<ForgotPasswordRequest> {
        Ok(ForgotPasswordRequest {
            email: email(&self.email)?,
            redirect_app_id: required(&self.redirect_app_id, "Redirect App ID is required")?,
            redirect_url: required(&self.redirect_url, "Redirect URL is required")?,
        })
    }
}

impl Validate for ResetPasswordRequest {
    type Output = String;

    fn validate(self) -> AppResult<String> {
        strong_password(&self.password, "Password must be provided")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: AppError) -> String {
        match err {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn signup() -> SignupRequest {
        SignupRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: " Ada@Example.COM ".into(),
            password: "Sup3r$ecret".into(),
        }
    }

    #[test]
    fn signup_normalizes_email() {
        let details = signup().validate().unwrap();
        assert_eq!(details.email, "ada@example.com");
        assert_eq!(details.first_name, "Ada");
    }

    #[test]
    fn signup_reports_first_failure() {
        let req = SignupRequest {
            first_name: "A".into(),
            email: String::new(),
            ..signup()
        };
        assert_eq!(message(req.validate().unwrap_err()), "First name is required");

        let req = SignupRequest {
            email: String::new(),
            ..signup()
        };
        assert_eq!(message(req.validate().unwrap_err()), "Email is required");

        let req = SignupRequest {
            email: "not-an-email".into(),
            ..signup()
        };
        assert_eq!(message(req.validate().unwrap_err()), "Invalid email");
    }

    #[test]
    fn password_strength_rules() {
        assert!(strong_password("Sup3r$ecret", "missing").is_ok());
        assert_eq!(
            message(strong_password("", "missing").unwrap_err()),
            "missing"
        );
        for weak in ["Sh0rt$", "alllower1$", "ALLUPPER1$", "NoDigits$$", "NoSymbol11"] {
            assert_eq!(message(strong_password(weak, "missing").unwrap_err()), WEAK_PASSWORD);
        }
    }

    #[test]
    fn login_requires_redirect_fields() {
        let req = LoginRequest {
            email: "a@x.com".into(),
            password: "whatever".into(),
            redirect_url: "https://app/".into(),
            redirect_app_id: " ".into(),
        };
        assert_eq!(
            message(req.validate().unwrap_err()),
            "Redirect App ID is required"
        );
    }

    #[test]
    fn login_does_not_apply_strength_rules() {
        let req = LoginRequest {
            email: "a@x.com".into(),
            password: "weak".into(),
            redirect_url: "https://app/".into(),
            redirect_app_id: "app-1".into(),
        };
        assert_eq!(req.validate().unwrap().password, "weak");
    }

    #[test]
    fn user_update_requires_account_status() {
        let req = UserUpdateRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "a@x.com".into(),
            account_status: String::new(),
        };
        assert_eq!(
            message(req.validate().unwrap_err()),
            "Account status is required"
        );
    }

    #[test]
    fn unknown_permission_is_rejected() {
        assert_eq!(permission("read").unwrap(), Permission::Read);
        assert_eq!(message(permission("OWNER").unwrap_err()), "OWNER is not supported");
        assert_eq!(message(permission("").unwrap_err()), "Permission is required");
    }

    #[test]
    fn profile_update_checks_only_supplied_fields() {
        let update = ProfileUpdateRequest {
            first_name: None,
            last_name: Some("Byron".into()),
            email: None,
        }
        .validate()
        .unwrap();
        assert_eq!(update.last_name.as_deref(), Some("Byron"));
        assert!(update.first_name.is_none());

        let err = ProfileUpdateRequest {
            email: Some("nope".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(message(err), "Invalid email");
    }
}
