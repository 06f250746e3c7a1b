//! `stockbook-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it models the
//! shop's role set, the JWT claims the API trusts once a token is verified,
//! and the HS256 validator used by the transport layer.

pub mod claims;
pub mod jwt;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use roles::{Role, UnknownRole};
