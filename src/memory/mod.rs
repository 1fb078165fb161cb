pub mod search;
pub mod stats;
pub mod store;
pub mod traversal;
pub mod types;

/// Current wall clock in milliseconds, the unit of `created_at`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
