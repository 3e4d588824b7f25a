/// Milliseconds since the Unix epoch, as stamped on every envelope.
pub fn timestamp_millis() -> i64 {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    dur.as_millis() as i64
}
