//! Authentication: access tokens, password hashing, and the request extractor.

pub mod extractor;
pub mod jwt;
pub mod password;

pub use extractor::AuthUser;
pub use jwt::{Claims, IssuedToken, JwtKeys};
pub use password::{check_password_policy, hash_password_blocking, verify_password_blocking};
