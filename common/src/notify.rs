// Notification preference resolution and email dispatch
//
// Recipient resolution is a pure function over the layered preference data:
// the customer's global flag, the owner's global flag, and the project-level
// owner override. Dispatch goes out over async SMTP.

use crate::config::SmtpConfig;
use crate::errors::NotifyError;
use crate::models::{Progress, Project, User};
use async_trait::async_trait;
use tracing::{info, instrument};

/// Compute the final recipient list for a project's progress notification.
///
/// The customer is included when present and not opted out globally. The
/// owner is included only when both their global preference and the
/// project's owner override allow it; either flag being false suppresses the
/// owner for this project's cycle. The result is deduplicated and an empty
/// list simply means dispatch is skipped.
pub fn resolve_recipients(
    project: &Project,
    customer: Option<&User>,
    owner: Option<&User>,
) -> Vec<String> {
    let mut recipients = Vec::new();

    if let Some(customer) = customer {
        if customer.email_notifications {
            recipients.push(customer.email.clone());
        }
    }

    if let Some(owner) = owner {
        if owner.email_notifications && project.owner_email_notifications {
            if !recipients.contains(&owner.email) {
                recipients.push(owner.email.clone());
            }
        }
    }

    recipients
}

/// Subject line for a progress update notification.
pub fn progress_email_subject(customer_name: Option<&str>) -> String {
    format!(
        "Project Progress Update - {}",
        customer_name.unwrap_or("Customer")
    )
}

/// HTML body for a progress update notification.
pub fn progress_email_body(project: &Project, progress: &Progress) -> String {
    let image_line = progress
        .image_path
        .as_deref()
        .map(|p| format!("<p><em>Image:</em> {p}</p>"))
        .unwrap_or_default();

    format!(
        r#"<div style="font-family:Arial,sans-serif;">
  <h2>Project Progress Update</h2>
  <p><strong>Project:</strong> {name}</p>
  <p><strong>Progress Count:</strong> {actual}</p>
  <p><strong>Expected:</strong> {expected}</p>
  <p><strong>Status:</strong> {status}</p>
  <p><strong>Time:</strong> {time}</p>
  {image_line}
  <hr/>
  <p>Best regards,<br/>Automated Progress Monitoring System</p>
</div>"#,
        name = project.name,
        actual = progress.progress_count,
        expected = progress.expected_count,
        status = progress.status,
        time = progress.timestamp.to_rfc2822(),
        image_line = image_line,
    )
}

/// Body for the operator-triggered test email.
pub fn test_email_body() -> &'static str {
    "<p>This is a test email from the Automated Progress Monitoring System.</p>"
}

/// Outbound mail capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an HTML message to the given recipients.
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), NotifyError>;
}

/// SMTP mailer over lettre's async STARTTLS transport.
pub struct SmtpMailer {
    host: String,
    port: u16,
    from_address: String,
    credentials: Option<(String, String)>,
}

impl SmtpMailer {
    /// Build a mailer from SMTP settings.
    ///
    /// Returns `None` when no host is configured, signalling that mail
    /// delivery is disabled for this deployment.
    pub fn from_config(config: &SmtpConfig) -> Option<Self> {
        let host = config.host.clone()?;
        Some(Self {
            host,
            port: config.port,
            from_address: config.from_address.clone(),
            credentials: match (&config.username, &config.password) {
                (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
                _ => None,
            },
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, html), fields(recipients = to.len()))]
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), NotifyError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let mut builder = Message::builder()
            .from(self.from_address.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in to {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder
            .body(html.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?.port(self.port);
        if let Some((user, pass)) = &self.credentials {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        info!(subject = subject, "Notification email sent");
        Ok(())
    }
}

/// Placeholder mailer for deployments without SMTP configured.
///
/// Every send fails with `NotConfigured`, which the pipeline treats as a
/// per-project soft failure: the progress record persists without email
/// markers and the cycle continues.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _to: &[String], _subject: &str, _html: &str) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProgressStatus, Role};
    use chrono::Utc;
    use uuid::Uuid;

    fn project(owner_override: bool) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Line 7 retrofit".to_string(),
            description: None,
            total_units: 100,
            start_date: Utc::now(),
            end_date: Utc::now() + chrono::Duration::days(10),
            schedule: Vec::new(),
            customer: None,
            owner_email_notifications: owner_override,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(role: Role, email: &str, notifications: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or("user").to_string(),
            role,
            email: email.to_string(),
            email_notifications: notifications,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_all_preferences_true_includes_both() {
        let customer = user(Role::Customer, "cust@example.com", true);
        let owner = user(Role::Owner, "owner@example.com", true);
        let recipients = resolve_recipients(&project(true), Some(&customer), Some(&owner));
        assert_eq!(recipients, vec!["cust@example.com", "owner@example.com"]);
    }

    #[test]
    fn test_customer_opt_out_leaves_owner_only() {
        let customer = user(Role::Customer, "cust@example.com", false);
        let owner = user(Role::Owner, "owner@example.com", true);
        let recipients = resolve_recipients(&project(true), Some(&customer), Some(&owner));
        assert_eq!(recipients, vec!["owner@example.com"]);
    }

    #[test]
    fn test_project_override_suppresses_owner_regardless_of_global_pref() {
        let customer = user(Role::Customer, "cust@example.com", true);
        let owner = user(Role::Owner, "owner@example.com", true);
        let recipients = resolve_recipients(&project(false), Some(&customer), Some(&owner));
        assert_eq!(recipients, vec!["cust@example.com"]);
    }

    #[test]
    fn test_owner_global_opt_out_suppresses_owner() {
        let owner = user(Role::Owner, "owner@example.com", false);
        let recipients = resolve_recipients(&project(true), None, Some(&owner));
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_no_users_yields_empty_list() {
        assert!(resolve_recipients(&project(true), None, None).is_empty());
    }

    #[test]
    fn test_recipients_are_deduplicated() {
        let customer = user(Role::Customer, "same@example.com", true);
        let owner = user(Role::Owner, "same@example.com", true);
        let recipients = resolve_recipients(&project(true), Some(&customer), Some(&owner));
        assert_eq!(recipients, vec!["same@example.com"]);
    }

    #[test]
    fn test_body_includes_artifact_reference_when_present() {
        let proj = project(true);
        let progress = Progress {
            id: Uuid::new_v4(),
            project_id: proj.id,
            timestamp: Utc::now(),
            progress_count: 60,
            expected_count: 7,
            status: ProgressStatus::Ahead,
            deviation: 53,
            image_path: Some("1234_frame.jpg".to_string()),
            metadata: None,
            email_sent: false,
            email_sent_at: None,
            created_at: Utc::now(),
        };
        let body = progress_email_body(&proj, &progress);
        assert!(body.contains("1234_frame.jpg"));
        assert!(body.contains("ahead"));
        assert!(body.contains("Line 7 retrofit"));
    }

    #[test]
    fn test_body_omits_image_line_when_absent() {
        let proj = project(true);
        let progress = Progress {
            id: Uuid::new_v4(),
            project_id: proj.id,
            timestamp: Utc::now(),
            progress_count: 10,
            expected_count: 10,
            status: ProgressStatus::OnTime,
            deviation: 0,
            image_path: None,
            metadata: None,
            email_sent: false,
            email_sent_at: None,
            created_at: Utc::now(),
        };
        assert!(!progress_email_body(&proj, &progress).contains("<em>Image:</em>"));
    }

    #[tokio::test]
    async fn test_disabled_mailer_always_fails_soft() {
        let mailer = DisabledMailer;
        let result = mailer
            .send(&["a@example.com".to_string()], "subject", "<p>hi</p>")
            .await;
        assert!(matches!(result, Err(NotifyError::NotConfigured)));
    }

    #[test]
    fn test_smtp_mailer_requires_host() {
        let config = SmtpConfig {
            host: None,
            port: 587,
            from_address: "monitor@example.com".to_string(),
            username: None,
            password: None,
        };
        assert!(SmtpMailer::from_config(&config).is_none());
    }
}
