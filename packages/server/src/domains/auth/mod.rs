//! Auth domain - passwordless login with one-time codes
//!
//! Flow:
//!   request → 6-digit code hashed into `otps`, plaintext delivered by SMS
//!   verify  → hash comparison, attempt budget, then a 12h HS256 JWT
//!
//! Responsibilities:
//! - OTP lifecycle: issue, resend with cooldown, verify, purge
//! - Session/JWT token management
//! - Code hashing so storage never holds a usable code

pub mod actions;
pub mod jwt;
pub mod models;

pub use jwt::{Claims, JwtService};
