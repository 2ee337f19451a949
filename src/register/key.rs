//! Register key derivation
//!
//! One register exists per user and calendar month:
//!
//! ```text
//! <namespace>:<user-id>:<YYYYMM>   e.g. u:sign:10000:202001
//! ```

use crate::types::UserId;
use chrono::NaiveDate;

/// Default key namespace for attendance registers
pub const DEFAULT_NAMESPACE: &str = "u:sign";

/// Builds store keys for monthly attendance registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: String,
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyBuilder {
    /// Create a key builder for the given namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Namespace prefix used for every key
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key of the register holding `date`'s month for `user_id`
    ///
    /// Any two dates in the same year-month map to the same key.
    pub fn build_key(&self, user_id: UserId, date: NaiveDate) -> String {
        format!("{}:{}:{}", self.namespace, user_id, date.format("%Y%m"))
    }
}
