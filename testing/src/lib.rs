//! # Backline Testing
//!
//! Testing utilities and helpers for Backline.
//!
//! This crate provides:
//! - [`FixedClock`] and [`test_clock`] for deterministic time
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`InMemoryRecordStore`], a record store that enforces foreign keys,
//!   unique columns and atomic batches without a database
//!
//! ## Example
//!
//! ```ignore
//! use backline_testing::{test_clock, InMemoryRecordStore};
//!
//! #[tokio::test]
//! async fn creates_contact() {
//!     let store = InMemoryRecordStore::new(office_schema());
//!     let ledger = Ledger::new(Arc::new(store.clone()), Arc::new(test_clock()));
//!     ledger.create_contact(draft).await.unwrap();
//!     assert_eq!(store.count("contacts"), 1);
//! }
//! ```

use backline_core::environment::Clock;
use chrono::{DateTime, Utc};


/// In-memory record store
pub mod record_store_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use backline_testing::mocks::FixedClock;
    /// use backline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-15 12:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use record_store_mocks::{ForeignKey, InMemoryRecordStore, OnDelete, Schema, TableSchema};
pub use reducer_test::{ReducerTest, assertions};
