//! Signup form submission driver.
//!
//! Drives one navigate -> fill -> submit -> observe-result pass for a single
//! identifier and classifies what the site's result popup says.

use rand::Rng;
use tracing::{debug, info};

use super::{BrowserError, Session};

/// Fixed signup page URL on the target site.
pub const TARGET_URL: &str = "https://www.oamfuture.com/index/auth/signup.html";

/// Generated password length.
const PASSWORD_LENGTH: usize = 8;

/// Form control positions on the signup page.
mod selectors {
    pub const PHONE_INPUT: &str = "#signup-form div:nth-of-type(1) input";
    pub const PASSWORD_INPUT: &str = "#signup-form div:nth-of-type(2) input";
    pub const CONFIRM_INPUT: &str = "#signup-form div:nth-of-type(3) input";
    pub const SUBMIT_BUTTON: &str = "#signup-form div:nth-of-type(5) div input";
    pub const RESULT_POPUP: &str = "div.mui-popup-text";
}

/// Classified result of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Fail,
    /// No result indicator appeared, or its text matched neither known value.
    Unknown,
}

/// Submits one identifier at a time through an existing [`Session`].
pub struct SignupDriver {
    target_url: String,
    result_timeout_secs: u64,
}

impl SignupDriver {
    pub fn new(target_url: impl Into<String>, result_timeout_secs: u64) -> Self {
        Self {
            target_url: target_url.into(),
            result_timeout_secs,
        }
    }

    /// Submit the signup form for `identifier`.
    ///
    /// Errors during navigation and form interaction propagate so the caller
    /// can log them against the identifier and active proxy. Once the form is
    /// submitted, a missing or unreadable result indicator is absorbed into
    /// [`Outcome::Unknown`] rather than crashing the batch.
    pub async fn submit(
        &self,
        session: &Session,
        identifier: &str,
    ) -> Result<Outcome, BrowserError> {
        session.navigate(&self.target_url).await?;

        session
            .clear_and_type(selectors::PHONE_INPUT, identifier)
            .await?;

        // One password typed into both fields: the site requires a matching
        // confirmation, so the values must never be independent draws.
        let password = random_password(PASSWORD_LENGTH);
        session
            .type_into(selectors::PASSWORD_INPUT, &password)
            .await?;
        session
            .type_into(selectors::CONFIRM_INPUT, &password)
            .await?;

        session.click(selectors::SUBMIT_BUTTON).await?;

        Ok(self.observe_result(session, identifier).await)
    }

    /// Wait for the result popup and classify its text.
    async fn observe_result(&self, session: &Session, identifier: &str) -> Outcome {
        match session
            .wait_for_text(selectors::RESULT_POPUP, self.result_timeout_secs)
            .await
        {
            Ok(text) => match text.trim() {
                "success" => {
                    info!("Success for: {}", identifier);
                    Outcome::Success
                }
                "fail" => {
                    info!("Fail for: {}", identifier);
                    Outcome::Fail
                }
                other => {
                    debug!("Unexpected result text for {}: {:?}", identifier, other);
                    Outcome::Unknown
                }
            },
            Err(e) => {
                debug!("No result indicator for {}: {}", identifier, e);
                Outcome::Unknown
            }
        }
    }
}

/// Random password over ASCII letters, digits, and punctuation.
pub fn random_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
          !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_has_requested_length() {
        assert_eq!(random_password(8).len(), 8);
        assert_eq!(random_password(32).len(), 32);
    }

    #[test]
    fn password_draws_from_printable_ascii() {
        let password = random_password(512);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_punctuation()));
    }
}
