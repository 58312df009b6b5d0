//! Multi-step authentication prompts (email, password, confirmation) layered over the
//! command interpreter. Each flow is a value; [`AuthFlow::submit`] consumes it and returns
//! the next state or a terminal request for the auth service.

use crate::errors::ValidationError;
use crate::validation::is_plausible_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    Email,
    Password,
    Confirm,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthFlow {
    mode: AuthMode,
    step: AuthStep,
    email: String,
    password: String,
    min_password_len: usize,
}

// Manual impl so the password never reaches a log line through `{:?}`.
impl std::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlow")
            .field("mode", &self.mode)
            .field("step", &self.step)
            .field("email", &self.email)
            .field("password", &crate::logutil::redact(&self.password))
            .finish()
    }
}

/// Result of feeding one line of input to a flow.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthTransition {
    /// The flow advanced and needs more input.
    Continue(AuthFlow),
    /// Input rejected; the flow stays at the same step.
    Retry(AuthFlow, ValidationError),
    /// Input rejected and the flow is discarded.
    Abort(ValidationError),
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    Reset { email: String },
}

impl AuthFlow {
    pub fn start(mode: AuthMode, min_password_len: usize) -> Self {
        Self {
            mode,
            step: AuthStep::Email,
            email: String::new(),
            password: String::new(),
            min_password_len,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn step(&self) -> AuthStep {
        self.step
    }

    /// Password and confirmation steps must never echo what was typed.
    pub fn is_secret_step(&self) -> bool {
        matches!(self.step, AuthStep::Password | AuthStep::Confirm)
    }

    pub fn prompt(&self) -> &'static str {
        match (self.mode, self.step) {
            (AuthMode::Reset, _) => "Enter the email address for your account (CANCEL to abort):",
            (_, AuthStep::Email) => "Email (CANCEL to abort):",
            (_, AuthStep::Password) => "Password:",
            (_, AuthStep::Confirm) => "Confirm password:",
        }
    }

    pub fn submit(mut self, input: &str) -> AuthTransition {
        match self.step {
            AuthStep::Email => {
                let email = input.trim();
                if !is_plausible_email(email) {
                    return AuthTransition::Retry(self, ValidationError::InvalidEmail);
                }
                if self.mode == AuthMode::Reset {
                    return AuthTransition::Reset {
                        email: email.to_string(),
                    };
                }
                self.email = email.to_string();
                self.step = AuthStep::Password;
                AuthTransition::Continue(self)
            }
            AuthStep::Password => {
                let password = input.trim_end_matches(['\r', '\n']);
                match self.mode {
                    AuthMode::Login => {
                        if password.is_empty() {
                            return AuthTransition::Retry(
                                self,
                                ValidationError::MissingArgument("a password"),
                            );
                        }
                        AuthTransition::SignIn {
                            email: self.email,
                            password: password.to_string(),
                        }
                    }
                    AuthMode::Register => {
                        if password.chars().count() < self.min_password_len {
                            let min = self.min_password_len;
                            return AuthTransition::Retry(
                                self,
                                ValidationError::PasswordTooShort { min },
                            );
                        }
                        self.password = password.to_string();
                        self.step = AuthStep::Confirm;
                        AuthTransition::Continue(self)
                    }
                    AuthMode::Reset => AuthTransition::Reset { email: self.email },
                }
            }
            AuthStep::Confirm => {
                let confirm = input.trim_end_matches(['\r', '\n']);
                if confirm != self.password {
                    return AuthTransition::Abort(ValidationError::PasswordMismatch);
                }
                AuthTransition::SignUp {
                    email: self.email,
                    password: self.password,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_continue(t: AuthTransition) -> AuthFlow {
        match t {
            AuthTransition::Continue(flow) => flow,
            other => panic!("expected Continue, got {:?}", other),
        }
    }

    #[test]
    fn login_collects_email_then_password() {
        let flow = AuthFlow::start(AuthMode::Login, 6);
        assert!(!flow.is_secret_step());
        let flow = expect_continue(flow.submit("a@b.com"));
        assert_eq!(flow.step(), AuthStep::Password);
        assert!(flow.is_secret_step());
        assert_eq!(
            flow.submit("pw"),
            AuthTransition::SignIn {
                email: "a@b.com".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn register_requires_matching_confirmation() {
        let flow = AuthFlow::start(AuthMode::Register, 6);
        let flow = expect_continue(flow.submit("a@b.com"));
        let flow = expect_continue(flow.submit("secret1"));
        assert_eq!(flow.step(), AuthStep::Confirm);
        assert_eq!(
            flow.clone().submit("secret1"),
            AuthTransition::SignUp {
                email: "a@b.com".into(),
                password: "secret1".into()
            }
        );
        assert_eq!(
            flow.submit("secret2"),
            AuthTransition::Abort(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn short_register_password_stays_on_step() {
        let flow = AuthFlow::start(AuthMode::Register, 6);
        let flow = expect_continue(flow.submit("a@b.com"));
        match flow.submit("abc") {
            AuthTransition::Retry(flow, ValidationError::PasswordTooShort { min: 6 }) => {
                assert_eq!(flow.step(), AuthStep::Password)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reset_finishes_at_email_step() {
        let flow = AuthFlow::start(AuthMode::Reset, 6);
        assert_eq!(
            flow.submit(" a@b.com "),
            AuthTransition::Reset {
                email: "a@b.com".into()
            }
        );
    }

    #[test]
    fn bad_email_is_retried() {
        let flow = AuthFlow::start(AuthMode::Login, 6);
        match flow.submit("not-an-email") {
            AuthTransition::Retry(flow, ValidationError::InvalidEmail) => {
                assert_eq!(flow.step(), AuthStep::Email)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let flow = AuthFlow::start(AuthMode::Register, 6);
        let flow = expect_continue(flow.submit("a@b.com"));
        let flow = expect_continue(flow.submit("topsecret"));
        assert!(!format!("{:?}", flow).contains("topsecret"));
    }
}
