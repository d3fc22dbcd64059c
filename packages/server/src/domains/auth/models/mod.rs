pub mod otp;

pub use otp::{
    generate_code, hash_code, Otp, OtpPurpose, OTP_MAX_ATTEMPTS, OTP_MAX_RESENDS, OTP_TTL_MINUTES,
};
