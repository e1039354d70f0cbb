pub fn get_current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// ISO-8601 timestamp in UTC, second precision.
pub fn get_current_iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
