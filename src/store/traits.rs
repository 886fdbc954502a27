//! `DraftStore` trait: key-value port for locally mirrored drafts.

use async_trait::async_trait;

use crate::error::StoreError;

/// Well-known store keys.
pub mod keys {
    pub const USER_ID: &str = "userId";
    pub const PERSONAL_DETAILS: &str = "personalDetails";
    pub const CONTACT_DETAILS: &str = "contactDetails";
    pub const BANK_TAX_DETAILS: &str = "bankTaxDetails";
    pub const SCHEME_SELECTION: &str = "schemeSelection";
    pub const NOMINEE_DETAILS: &str = "nomineeDetails";
    pub const UPLOAD_DOCUMENTS: &str = "uploadDocuments";

    /// Every key the wizard writes.
    pub const ALL: &[&str] = &[
        USER_ID,
        PERSONAL_DETAILS,
        CONTACT_DETAILS,
        BANK_TAX_DETAILS,
        SCHEME_SELECTION,
        NOMINEE_DETAILS,
        UPLOAD_DOCUMENTS,
    ];
}

/// Local key-value storage for serialized drafts.
///
/// Reads never fail: a key that cannot be read is reported as absent.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove one key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key the wizard writes.
    async fn clear_all(&self) -> Result<(), StoreError>;
}
