//! Auth domain actions - business logic functions
//!
//! Actions are async functions called directly from the REST handlers.

mod request_otp;
mod resend_otp;
mod verify_otp;

pub use request_otp::{request_otp, RequestOtpResult};
pub use resend_otp::{resend_otp, ResendOtpResult};
pub use verify_otp::{verify_otp, VerifyOtpResult};
