// utils/otp_generator.rs
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use subtle::ConstantTimeEq;

pub const OTP_TTL_MINUTES: i64 = 10;

pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    format!("{:06}", rng.random_range(100000..1000000))
}

pub fn otp_expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

#[derive(Debug, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
}

/// Exact, constant-time match against the stored code, then the expiry.
/// A missing code or expiry never validates.
pub fn check_otp(
    stored_code: Option<&str>,
    stored_expires: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
) -> OtpCheck {
    let (Some(code), Some(expires)) = (stored_code, stored_expires) else {
        return OtpCheck::Mismatch;
    };

    let matched: bool = code.as_bytes().ct_eq(submitted.as_bytes()).into();
    if !matched {
        return OtpCheck::Mismatch;
    }

    if expires <= now {
        return OtpCheck::Expired;
    }

    OtpCheck::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let now = Utc::now();
        assert_eq!(otp_expiry_from(now) - now, Duration::minutes(10));
    }

    #[test]
    fn exact_unexpired_code_is_valid() {
        let now = Utc::now();
        let expires = now + Duration::minutes(5);
        assert_eq!(check_otp(Some("123456"), Some(expires), "123456", now), OtpCheck::Valid);
    }

    #[test]
    fn wrong_or_partial_code_is_rejected() {
        let now = Utc::now();
        let expires = now + Duration::minutes(5);
        assert_eq!(check_otp(Some("123456"), Some(expires), "123457", now), OtpCheck::Mismatch);
        assert_eq!(check_otp(Some("123456"), Some(expires), "12345", now), OtpCheck::Mismatch);
    }

    #[test]
    fn padded_code_is_not_an_exact_match() {
        let now = Utc::now();
        let expires = now + Duration::minutes(5);
        assert_eq!(check_otp(Some("123456"), Some(expires), " 123456", now), OtpCheck::Mismatch);
        assert_eq!(check_otp(Some("123456"), Some(expires), "123456\n", now), OtpCheck::Mismatch);
    }

    #[test]
    fn expired_code_is_rejected() {
        let now = Utc::now();
        let expires = now - Duration::seconds(1);
        assert_eq!(check_otp(Some("123456"), Some(expires), "123456", now), OtpCheck::Expired);
        assert_eq!(check_otp(Some("123456"), Some(now), "123456", now), OtpCheck::Expired);
    }

    #[test]
    fn cleared_code_never_matches() {
        let now = Utc::now();
        assert_eq!(check_otp(None, None, "123456", now), OtpCheck::Mismatch);
        assert_eq!(check_otp(None, Some(now), "", now), OtpCheck::Mismatch);
    }
}
