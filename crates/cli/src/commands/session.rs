//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! prepper login --access-token <token> --refresh-token <token> --user '{"id":1,"email":"a@b.dk"}'
//! prepper whoami
//! prepper logout
//! ```

use serde_json::Value;
use sgtprepper_storefront::Storefront;
use sgtprepper_storefront::services::auth::SessionTokens;

use super::{CliError, print_json};

/// Store the given tokens and profile as the current session.
///
/// # Errors
///
/// Returns `CliError` if `user` is not valid JSON or the session cannot be
/// written.
pub fn login(
    storefront: &Storefront,
    access_token: String,
    refresh_token: Option<String>,
    user: Option<&str>,
) -> Result<(), CliError> {
    let user = user.map(serde_json::from_str::<Value>).transpose()?;

    storefront.session().set_session(
        SessionTokens {
            access_token: Some(access_token),
            refresh_token,
        },
        user,
    )?;

    identify(storefront);
    println!("Signed in");
    Ok(())
}

/// Clear the stored session.
///
/// # Errors
///
/// Returns `CliError` if storage rejects the removal.
pub fn logout(storefront: &Storefront) -> Result<(), CliError> {
    storefront.session().clear_session()?;
    clear_sentry_user();
    println!("Signed out");
    Ok(())
}

/// Print the signed-in user.
///
/// # Errors
///
/// Returns `CliError` if the profile cannot be printed.
pub fn whoami(storefront: &Storefront) -> Result<(), CliError> {
    let session = storefront.session();
    match session.user() {
        Some(user) => print_json(&user)?,
        None if session.is_authenticated() => println!("Signed in (no profile stored)"),
        None => println!("Not signed in"),
    }
    Ok(())
}

/// Associate Sentry events with the stored user, if any.
pub fn identify(storefront: &Storefront) {
    let Some(user) = storefront.session().user() else {
        return;
    };
    let id = user.get("id").and_then(|id| match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let email = user.get("email").and_then(Value::as_str);
    if let Some(id) = id {
        set_sentry_user(&id, email);
    }
}

/// Set the Sentry user context.
fn set_sentry_user(user_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
