//! Registration backend: the external service each step is saved to.

pub mod http;
pub mod memory;
pub mod traits;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use traits::{DuplicateQuery, DuplicateReport, RegistrationBackend, SubmitAck};
