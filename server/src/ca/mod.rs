//! Private certificate authority: self-generated root plus short-lived
//! leaf certificates signed from agent CSRs.

pub mod authority;
pub mod handler;

pub use authority::CertificateAuthority;

// vim: ts=4
