//! Enroll Wizard: step-wise pension registration with local drafts and
//! backend duplicate checks.

pub mod backend;
pub mod config;
pub mod error;
pub mod store;
pub mod validate;
pub mod wizard;
