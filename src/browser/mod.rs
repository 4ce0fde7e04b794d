//! Browser session management and the signup submission driver.

mod errors;
mod session;
mod signup;

pub use errors::BrowserError;
pub use session::{Session, SessionConfig};
pub use signup::{random_password, Outcome, SignupDriver, TARGET_URL};
