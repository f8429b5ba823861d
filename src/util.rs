use chrono::Utc;

/// Unix timestamp in seconds, as stamped on stored messages.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}
