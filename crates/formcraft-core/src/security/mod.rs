//! Role and plan based access decisions.
//!
//! An [`AuthContext`] is built from a verified token and answers "may this
//! user do X" questions. A [`FeatureGate`] answers the same for the tenant's
//! plan: which features are on and whether a quota has room left.

pub mod context;
pub mod error;
pub mod plan;

pub use context::AuthContext;
pub use error::{SecurityError, SecurityResult};
pub use plan::FeatureGate;
