//! Session commands.

use super::open_session;
use crate::output::{self, row, OutputFormat};
use anyhow::Result;
use expediente_config::{Config, Paths};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use themis::{AuthError, PermissionEvaluator, Session, SessionStatus, UserProfile};

/// Sign in, prompting for whatever was not supplied.
pub async fn login(
    config: &Config,
    paths: &Paths,
    email: Option<String>,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let session = open_session(config, paths).await?;

    if let Some(user) = session.user() {
        output::print_success(&format!("Already signed in as {}", user.email), format);
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => {
            print!("Email: ");
            io::stdout().flush()?;
            let mut email = String::new();
            io::stdin().read_line(&mut email)?;
            email.trim().to_string()
        }
    };
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    match session.sign_in(&email, &password).await {
        Ok(user) => {
            output::print_success(
                &format!("Signed in as {} ({})", user.email, user.role),
                format,
            );
            Ok(())
        }
        Err(AuthError::Validation(message)) | Err(AuthError::Authentication(message)) => {
            output::print_error(&message, format);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Sign out and clear stored credentials.
pub async fn logout(config: &Config, paths: &Paths, format: &OutputFormat) -> Result<()> {
    let session = open_session(config, paths).await?;
    let was_signed_in = session.snapshot().is_authenticated();

    session.sign_out().await;

    if was_signed_in {
        output::print_success("Signed out", format);
    } else {
        output::print_success("No active session; local credentials cleared", format);
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    permissions: Vec<&'static str>,
}

impl From<Session> for StatusReport {
    fn from(session: Session) -> Self {
        let permissions = session
            .user
            .as_ref()
            .map(|user| PermissionEvaluator::permissions(user.role).to_vec())
            .unwrap_or_default();
        Self {
            status: session.status,
            user: session.user,
            error: session.error,
            permissions,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            SessionStatus::Authenticated => "signed in",
            SessionStatus::Unauthenticated => "signed out",
            SessionStatus::Bootstrapping | SessionStatus::Authenticating => "pending",
        };
        writeln!(f, "{}", row("Session", status))?;
        if let Some(user) = &self.user {
            writeln!(f, "{}", row("User", &format!("{} <{}>", user.name, user.email)))?;
            writeln!(f, "{}", row("User ID", &user.id))?;
            writeln!(f, "{}", row("Role", user.role.as_str()))?;
            if let Some(institution) = &user.institution {
                writeln!(f, "{}", row("Institution", institution))?;
            }
            writeln!(f, "{}", row("Permissions", &self.permissions.join(", ")))?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "{}", row("Last error", error))?;
        }
        Ok(())
    }
}

/// Show the restored session.
pub async fn status(config: &Config, paths: &Paths, format: &OutputFormat) -> Result<()> {
    let session = open_session(config, paths).await?;
    output::print(&StatusReport::from(session.snapshot()), format);
    Ok(())
}

#[derive(Serialize)]
struct PermissionCheck<'a> {
    permission: &'a str,
    granted: bool,
}

impl fmt::Display for PermissionCheck<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.granted { "granted" } else { "denied" };
        write!(f, "{}: {}", self.permission, verdict)
    }
}

/// Check whether the signed-in user holds `permission`.
pub async fn can(
    config: &Config,
    paths: &Paths,
    permission: &str,
    format: &OutputFormat,
) -> Result<()> {
    let session = open_session(config, paths).await?;
    let check = PermissionCheck {
        permission,
        granted: session.has_permission(permission),
    };
    output::print(&check, format);
    Ok(())
}
