//! Deployment of file records into a runnable site layout.

pub mod layout;
pub mod router;

pub use layout::{classify, normalize, resolve, Placement};
pub use router::{deploy, DeployReport, Deployer, DuplicatePolicy, SkippedRecord};
