//! Ticket, OTP and transaction-reference generation.
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use super::week::ist;

/// A 6-digit human-facing ticket number.
pub fn new_ticket() -> i64 {
    rand::thread_rng().gen_range(100_000..1_000_000)
}

/// A 6-digit delivery OTP. Same shape as a ticket, generated independently.
pub fn new_otp() -> i64 {
    rand::thread_rng().gen_range(100_000..1_000_000)
}

/// Transaction id in the form `T{ddMMyyyy}{6 random digits}`, date-stamped in IST.
pub fn new_transaction_ref(now: DateTime<Utc>) -> String {
    format!("T{}{}", date_stamp(now), rand::thread_rng().gen_range(100_000..1_000_000))
}

/// Merchant reference in the form `M{ddMMyyyy}{6 random digits}`, date-stamped in IST. This is the identifier the
/// payment gateway echoes back in webhook deliveries.
pub fn new_merchant_ref(now: DateTime<Utc>) -> String {
    format!("M{}{}", date_stamp(now), rand::thread_rng().gen_range(100_000..1_000_000))
}

fn date_stamp(now: DateTime<Utc>) -> String {
    let ist_now = now.with_timezone(&ist());
    format!("{:02}{:02}{}", ist_now.day(), ist_now.month(), ist_now.year())
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn tickets_are_six_digits() {
        for _ in 0..100 {
            let t = new_ticket();
            assert!((100_000..1_000_000).contains(&t));
        }
    }

    #[test]
    fn refs_are_date_stamped_in_ist() {
        // 2025-06-25 20:00 UTC is already 2025-06-26 in IST.
        let now = Utc.with_ymd_and_hms(2025, 6, 25, 20, 0, 0).unwrap();
        let txid = new_transaction_ref(now);
        assert!(txid.starts_with("T26062025"), "{txid}");
        let mref = new_merchant_ref(now);
        assert!(mref.starts_with("M26062025"), "{mref}");
        assert_eq!(txid.len(), 1 + 8 + 6);
    }
}
