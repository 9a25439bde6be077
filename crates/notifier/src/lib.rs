//! Outage Notifier
//!
//! Resolves the instances affected by an outage to the users who own them and
//! stages one rendered notification per user for the delivery step.

pub mod collector;
pub mod config;
pub mod notification;
pub mod pipeline;
pub mod renderer;
pub mod run_log;
pub mod schedule;
pub mod tenants;
pub mod users;

pub use collector::{read_instance_ids, InstanceCollector, InstanceFilter};
pub use config::NotifierConfig;
pub use notification::{
    is_valid_email, NotificationRecord, Notifier, NotifyOptions, NotifySummary, RecipientFilter,
    SkipReason,
};
pub use pipeline::{run, RunOptions, RunSummary};
pub use renderer::{Renderer, TemplateRenderer};
pub use run_log::RunLog;
pub use schedule::{parse_start_time, OutageWindow};
pub use tenants::{aggregate_tenants, OrphanedProject, TenantAggregation};
pub use users::{aggregate_users, UserDirectory, UserRecord};
