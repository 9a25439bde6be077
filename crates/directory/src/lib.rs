//! Directory Service access
//!
//! The outage notifier only reads from the control plane. Everything it
//! needs goes through the [`DirectoryService`] trait:
//!
//! - `http`: compute and identity REST APIs authenticated by a pre-issued token
//! - `fixture`: in-memory directory loaded from a JSON file, for dry runs and tests
//! - `config`: selects and builds one of the above from the environment

pub mod config;
pub mod error;
pub mod fixture;
pub mod http;
pub mod service;

pub use config::DirectoryConfig;
pub use error::{DirectoryError, DirectoryResult};
pub use fixture::{Fixture, FixtureDirectory};
pub use http::HttpDirectory;
pub use service::{DirectoryService, InstanceQuery};
