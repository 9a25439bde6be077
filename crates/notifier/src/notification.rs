//! Notification decision, rendering and staging
//!
//! For every user record the notifier decides whether a notification is due,
//! renders it through the configured template and writes it to the staging
//! directory as a file named after the recipient.

use anyhow::{Context, Result};
use outage_common::{fold_subject, StagedMessage};
use regex::Regex;
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::renderer::Renderer;
use crate::run_log::RunLog;
use crate::schedule::OutageWindow;
use crate::users::{UserDirectory, UserRecord};

/// Appended to the default subject when the user has affected instances
pub const AFFECTED_SUFFIX: &str = " concerning your instances";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^[\w.\-']+@(\w[\w\-]+\.)+[\w\-]+$").expect("email pattern is valid")
});

/// Basic address sanity check, ASCII only
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Why a user is not notified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoEmail,
    InvalidEmail(String),
    NoInstances,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "user is disabled"),
            SkipReason::NoEmail => write!(f, "no email address"),
            SkipReason::InvalidEmail(email) => write!(f, "invalid email address {}", email),
            SkipReason::NoInstances => write!(f, "no affected instances"),
        }
    }
}

/// Run-wide rendering inputs
#[derive(Debug, Clone)]
pub struct NotifyOptions {
    /// Template name inside the templates directory
    pub template: String,

    /// Used verbatim when set
    pub subject: Option<String>,

    pub default_subject: String,

    pub zone: Option<String>,

    pub node: Option<String>,

    pub window: Option<OutageWindow>,

    pub timezone: Option<String>,
}

/// A rendered notification for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub instance_count: usize,
}

impl NotificationRecord {
    pub fn message(&self) -> StagedMessage {
        StagedMessage::new(self.subject.as_str(), self.body.as_str())
    }
}

/// Which users a run may notify
#[derive(Debug, Clone, Default)]
pub struct RecipientFilter {
    /// Only the user whose email equals this address
    pub test_recipient: Option<String>,

    /// Only the user with this id
    pub user_id: Option<String>,
}

impl RecipientFilter {
    fn allows(&self, record: &UserRecord) -> bool {
        if let Some(recipient) = &self.test_recipient {
            if record.email.as_deref().map(str::trim) != Some(recipient.as_str()) {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if &record.id != user_id {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub notified: usize,
    pub skipped: usize,
    pub instances: usize,
}

pub struct Notifier<'a> {
    renderer: &'a dyn Renderer,
    options: NotifyOptions,
    staging_dir: PathBuf,
}

impl<'a> Notifier<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        options: NotifyOptions,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            options,
            staging_dir: staging_dir.into(),
        }
    }

    /// Recipient address, if `record` should be notified
    pub fn recipient<'r>(&self, record: &'r UserRecord) -> Result<&'r str, SkipReason> {
        if !record.enabled {
            return Err(SkipReason::Disabled);
        }
        let email = record.email.as_deref().ok_or(SkipReason::NoEmail)?.trim();
        if !is_valid_email(email) {
            return Err(SkipReason::InvalidEmail(email.to_string()));
        }
        if record.instance_count() == 0 {
            return Err(SkipReason::NoInstances);
        }
        Ok(email)
    }

    pub fn subject_for(&self, instance_count: usize) -> String {
        match &self.options.subject {
            Some(subject) => fold_subject(subject),
            None if instance_count > 0 => {
                fold_subject(&format!("{}{}", self.options.default_subject, AFFECTED_SUFFIX))
            }
            None => fold_subject(&self.options.default_subject),
        }
    }

    pub fn context_for(&self, record: &UserRecord) -> serde_json::Value {
        let window = self.options.window.as_ref();
        let instance_count = record.instance_count();

        json!({
            "instances": record.instances,
            "zone": self.options.zone,
            "start_ts": window.map(OutageWindow::start_ts),
            "end_ts": window.map(OutageWindow::end_ts),
            "days": window.map(OutageWindow::days),
            "hours": window.map(OutageWindow::hours),
            "tz": self.options.timezone,
            "node": self.options.node,
            "affected": instance_count > 0,
            "name": record.name,
            "email": record.email,
            "instance_count": instance_count,
        })
    }

    /// Decide and render, without touching the staging directory
    pub fn compose(&self, record: &UserRecord) -> Result<Option<NotificationRecord>> {
        let recipient = match self.recipient(record) {
            Ok(email) => email,
            Err(reason) => {
                debug!("User {}: not notified, {}", record.name, reason);
                return Ok(None);
            }
        };

        let instance_count = record.instance_count();
        let body = self
            .renderer
            .render(&self.options.template, &self.context_for(record))
            .with_context(|| format!("Failed to render notification for {}", recipient))?;

        Ok(Some(NotificationRecord {
            recipient: recipient.to_string(),
            subject: self.subject_for(instance_count),
            body,
            instance_count,
        }))
    }

    /// Write a notification into the staging directory
    pub async fn stage(&self, notification: &NotificationRecord) -> Result<PathBuf> {
        let path = self.staging_dir.join(&notification.recipient);
        tokio::fs::write(&path, notification.message().to_framed())
            .await
            .with_context(|| format!("Failed to stage notification at {}", path.display()))?;
        Ok(path)
    }

    pub async fn notify(&self, record: &UserRecord) -> Result<Option<NotificationRecord>> {
        let Some(notification) = self.compose(record)? else {
            return Ok(None);
        };
        self.stage(&notification).await?;
        Ok(Some(notification))
    }

    /// Notify every user that passes `filter`
    pub async fn notify_all<W: Write>(
        &self,
        users: &UserDirectory,
        filter: &RecipientFilter,
        log: &mut RunLog<W>,
    ) -> Result<NotifySummary> {
        info!("Generating notification emails");
        let mut summary = NotifySummary::default();

        for record in users.iter().filter(|record| filter.allows(record)) {
            match self.notify(record).await? {
                Some(notification) => {
                    log.line(format!(
                        "User {}: sending email to {} => {} instances affected",
                        record.name, notification.recipient, notification.instance_count
                    ))?;
                    summary.notified += 1;
                    summary.instances += notification.instance_count;
                }
                None => summary.skipped += 1,
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::parse_start_time;
    use outage_common::Instance;
    use std::collections::BTreeMap;

    /// Echoes the context so tests can inspect it
    struct Echo;

    impl Renderer for Echo {
        fn render(&self, _template: &str, context: &serde_json::Value) -> Result<String> {
            Ok(context.to_string())
        }
    }

    fn options() -> NotifyOptions {
        NotifyOptions {
            template: "outage.hbs".to_string(),
            subject: None,
            default_subject: "Research Cloud outage".to_string(),
            zone: Some("qh2".to_string()),
            node: None,
            window: None,
            timezone: Some("AEST".to_string()),
        }
    }

    fn record(email: Option<&str>, enabled: bool, instances: usize) -> UserRecord {
        let mut by_project = BTreeMap::new();
        if instances > 0 {
            let list = (0..instances)
                .map(|i| Instance {
                    id: format!("i-{}", i),
                    project_id: "p-a".to_string(),
                    name: format!("vm-{}", i),
                    status: "ACTIVE".to_string(),
                    availability_zone: "qh2".to_string(),
                    host: None,
                })
                .collect();
            by_project.insert("alpha".to_string(), list);
        }

        UserRecord {
            id: "u-1".to_string(),
            name: "alice".to_string(),
            email: email.map(str::to_string),
            enabled,
            instances: by_project,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a.b@sub.example.org"));
        assert!(is_valid_email("o'neil@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(is_valid_email("alice@example.org"));
        assert!(!is_valid_email("alice@example.org, bob@example.org"));
        assert!(!is_valid_email("ü@example.org"));
    }

    #[test]
    fn test_skip_reasons() {
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), "/nonexistent");

        assert_eq!(
            notifier.recipient(&record(Some("a@example.org"), false, 1)),
            Err(SkipReason::Disabled)
        );
        assert_eq!(notifier.recipient(&record(None, true, 1)), Err(SkipReason::NoEmail));
        assert_eq!(
            notifier.recipient(&record(Some("not-an-email"), true, 1)),
            Err(SkipReason::InvalidEmail("not-an-email".to_string()))
        );
        assert_eq!(
            notifier.recipient(&record(Some("a@example.org"), true, 0)),
            Err(SkipReason::NoInstances)
        );
        assert_eq!(
            notifier.recipient(&record(Some("a.b@sub.example.org"), true, 2)),
            Ok("a.b@sub.example.org")
        );
    }

    #[tokio::test]
    async fn test_surrounding_whitespace_is_trimmed_from_email() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), dir.path());

        let user = record(Some(" alice@example.org \n"), true, 1);
        assert_eq!(notifier.recipient(&user), Ok("alice@example.org"));

        let notification = notifier.notify(&user).await.unwrap().unwrap();
        assert_eq!(notification.recipient, "alice@example.org");
        assert!(dir.path().join("alice@example.org").exists());

        let filter = RecipientFilter {
            test_recipient: Some("alice@example.org".to_string()),
            user_id: None,
        };
        assert!(filter.allows(&user));
    }

    #[test]
    fn test_disabled_user_is_never_rendered() {
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), "/nonexistent");

        let composed = notifier
            .compose(&record(Some("a@example.org"), false, 3))
            .unwrap();
        assert!(composed.is_none());
    }

    #[test]
    fn test_subject() {
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), "/nonexistent");
        assert_eq!(notifier.subject_for(1), "Research Cloud outage concerning your instances");
        assert_eq!(notifier.subject_for(0), "Research Cloud outage");

        let custom = Notifier::new(
            &renderer,
            NotifyOptions {
                subject: Some("Maintenance".to_string()),
                ..options()
            },
            "/nonexistent",
        );
        assert_eq!(custom.subject_for(5), "Maintenance");
    }

    #[tokio::test]
    async fn test_multiline_subject_matches_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Echo;
        let notifier = Notifier::new(
            &renderer,
            NotifyOptions {
                subject: Some("Maintenance\nnext week\n".to_string()),
                ..options()
            },
            dir.path(),
        );
        assert_eq!(notifier.subject_for(1), "Maintenance next week");

        let notification = notifier
            .notify(&record(Some("a@example.org"), true, 1))
            .await
            .unwrap()
            .unwrap();
        let staged = std::fs::read_to_string(dir.path().join("a@example.org")).unwrap();
        let message = StagedMessage::parse(&staged).unwrap();
        assert_eq!(message.subject, notification.subject);
        assert_eq!(message.body, notification.body);
    }

    #[test]
    fn test_context_with_and_without_window() {
        let renderer = Echo;
        let user = record(Some("a@example.org"), true, 2);

        let notifier = Notifier::new(&renderer, options(), "/nonexistent");
        let context = notifier.context_for(&user);
        assert!(context["start_ts"].is_null());
        assert!(context["days"].is_null());
        assert_eq!(context["zone"], "qh2");
        assert_eq!(context["affected"], true);
        assert_eq!(context["instance_count"], 2);
        assert_eq!(context["instances"]["alpha"][1]["id"], "i-1");

        let window = OutageWindow::from_start(parse_start_time("08:00 01-06-2025").unwrap(), 26)
            .unwrap();
        let notifier = Notifier::new(
            &renderer,
            NotifyOptions {
                window: Some(window),
                ..options()
            },
            "/nonexistent",
        );
        let context = notifier.context_for(&user);
        assert_eq!(context["start_ts"], "2025-06-01 08:00:00");
        assert_eq!(context["end_ts"], "2025-06-02 10:00:00");
        assert_eq!(context["days"], 1);
        assert_eq!(context["hours"], 2);
    }

    #[tokio::test]
    async fn test_stage_writes_framed_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), dir.path());

        let notification = notifier
            .notify(&record(Some("a.b@sub.example.org"), true, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notification.instance_count, 1);

        let staged = std::fs::read_to_string(dir.path().join("a.b@sub.example.org")).unwrap();
        assert!(staged.starts_with("Subject: Research Cloud outage concerning your instances\n"));
        assert!(staged.contains("vm-0"));
    }

    #[tokio::test]
    async fn test_notify_all_honours_test_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Echo;
        let notifier = Notifier::new(&renderer, options(), dir.path());

        let mut users = UserDirectory::new();
        for (id, email) in [("u-1", "a@example.org"), ("u-2", "b@example.org")] {
            let mut user = record(Some(email), true, 1);
            user.id = id.to_string();
            let outage_user = outage_common::User {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                enabled: true,
            };
            users.register(&outage_user).instances = user.instances;
        }

        let filter = RecipientFilter {
            test_recipient: Some("b@example.org".to_string()),
            user_id: None,
        };
        let mut log = RunLog::new(Vec::new());
        let summary = notifier.notify_all(&users, &filter, &mut log).await.unwrap();

        assert_eq!(summary.notified, 1);
        assert!(dir.path().join("b@example.org").exists());
        assert!(!dir.path().join("a@example.org").exists());

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert!(text.contains("sending email to b@example.org"));
    }
}
