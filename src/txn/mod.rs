use crate::common::{Timestamp, TXN_START_TS};

/// A transaction handle. Only the temporary timestamp matters to this
/// crate: it is stamped on every tuple the transaction writes, marking the
/// version as uncommitted work of this transaction.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn temp_ts(&self) -> Timestamp {
        TXN_START_TS + self.id
    }
}

/// Placeholder for the tuple/table lock manager. The executors thread it
/// through heap mutations; its locking protocol lives outside this crate.
#[derive(Debug, Default)]
pub struct LockManager;

impl LockManager {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_ts_above_commit_range() {
        let txn = Transaction::new(5);
        assert_eq!(txn.temp_ts(), TXN_START_TS + 5);
        assert!(txn.temp_ts() > u32::MAX as u64);
    }
}
