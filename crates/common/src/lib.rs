pub mod error;
pub mod message;
pub mod models;
pub mod nodeset;

pub use error::{Error, Result};
pub use message::{fold_subject, StagedMessage};
pub use models::{Instance, Project, RoleAssignment, User};
pub use nodeset::NodeSetError;
