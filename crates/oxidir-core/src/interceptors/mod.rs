//! The built-in interceptor stages, in their default chain order.
//!
//! Bypass sets name stages by these constants; internal code paths that
//! must avoid recursive interception (bootstrap, change-log replay, LDIF
//! ingest) use them to carve out exactly the stages they need.

mod authorization;
mod changelog;
mod exception;
mod normalization;
mod operational;
mod referral;
mod schema;

pub use authorization::AuthorizationInterceptor;
pub use changelog::ChangeLogInterceptor;
pub use exception::ExceptionInterceptor;
pub use normalization::NormalizationInterceptor;
pub use operational::{OperationalInterceptor, UuidAllocator};
pub use referral::ReferralInterceptor;
pub use schema::SchemaInterceptor;

pub const NORMALIZATION: &str = "normalization";
pub const REFERRAL: &str = "referral";
pub const AUTHORIZATION: &str = "authorization";
pub const EXCEPTION: &str = "exception";
pub const SCHEMA: &str = "schema";
pub const OPERATIONAL: &str = "operational";
pub const CHANGELOG: &str = "changelog";

/// Default stage order, normalization first, change-log recording last
/// before the nexus.
pub const DEFAULT_ORDER: [&str; 7] = [
    NORMALIZATION,
    REFERRAL,
    AUTHORIZATION,
    EXCEPTION,
    SCHEMA,
    OPERATIONAL,
    CHANGELOG,
];
