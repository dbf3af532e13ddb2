use chrono::{DateTime, Duration, Utc};

/// Derives the digital-copy expiry from the scan timestamp and the configured
/// retention window. Pure arithmetic; callers decide the reference timestamp
/// (the event's scan time when present, ingestion time otherwise).
pub fn compute_expiry(reference: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    reference + Duration::days(retention_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_is_exact() {
        let reference = Utc.with_ymd_and_hms(2025, 9, 10, 12, 30, 0).unwrap();
        let expiry = compute_expiry(reference, 30);
        assert_eq!(expiry, reference + Duration::days(30));
        assert_eq!(expiry - reference, Duration::days(30));
    }

    #[test]
    fn test_zero_window_keeps_reference() {
        let reference = Utc::now();
        assert_eq!(compute_expiry(reference, 0), reference);
    }
}
