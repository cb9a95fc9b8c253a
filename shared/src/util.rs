/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds in one minute
pub const MINUTE_MS: i64 = 60_000;

/// Milliseconds in one hour
pub const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Current UTC date formatted `YYYYMMDD` (order numbers, credit note codes)
pub fn utc_date_compact() -> String {
    chrono::Utc::now().format("%Y%m%d").to_string()
}
