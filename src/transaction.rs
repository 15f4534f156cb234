//! Transaction Contract Module
//!
//! The capability the surrounding storage framework supplies to the cache:
//! which transaction is active and which object keys it modified.

// == Object Source ==
/// Contract satisfied by the transaction collaborator.
///
/// Production code adapts its transaction type to this trait; tests use
/// [`TransactionView`].
pub trait ObjectSource: Send + Sync {
    /// Identifier of the current transaction.
    fn transaction_id(&self) -> i64;

    /// Keys of the objects this transaction modified, collected at close time.
    fn modified_keys(&self) -> Vec<String>;
}

// == Transaction View ==
/// Plain value implementation of [`ObjectSource`], convenient for tests and
/// for callers that assemble the modified set themselves.
#[derive(Debug, Clone, Default)]
pub struct TransactionView {
    /// Transaction identifier
    pub tid: i64,
    /// Keys modified during the transaction
    pub modified: Vec<String>,
}

impl TransactionView {
    /// Creates an empty view for the given transaction id.
    pub fn new(tid: i64) -> Self {
        Self {
            tid,
            modified: Vec::new(),
        }
    }

    /// Records a modified object key.
    pub fn record(&mut self, key: impl Into<String>) {
        self.modified.push(key.into());
    }
}

impl ObjectSource for TransactionView {
    fn transaction_id(&self) -> i64 {
        self.tid
    }

    fn modified_keys(&self) -> Vec<String> {
        self.modified.clone()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reports_tid_and_keys() {
        let mut view = TransactionView::new(42);
        view.record("oid1");
        view.record("oid2".to_string());

        assert_eq!(view.transaction_id(), 42);
        assert_eq!(
            view.modified_keys(),
            vec!["oid1".to_string(), "oid2".to_string()]
        );
    }

    #[test]
    fn test_empty_view() {
        let view = TransactionView::new(7);
        assert!(view.modified_keys().is_empty());
    }
}
