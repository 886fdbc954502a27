//! Local draft storage: the offline mirror of every step's form values.

pub mod drafts;
pub mod file;
pub mod memory;
pub mod traits;

pub use drafts::DraftRepository;
pub use file::FileDraftStore;
pub use memory::MemoryDraftStore;
pub use traits::{keys, DraftStore};
