//! # pw-verify
//!
//! Verification of applied changes along three independent dimensions:
//! syntax, edge cases, and regressions.
//!
//! Each dimension is a [`Checker`], an injected capability that takes a
//! [`CheckPayload`] and returns a [`CheckReport`](pw_changeset::CheckReport).
//! The [`VerificationCoordinator`] always runs all three (concurrently,
//! each under its own timeout) and aggregates them into a
//! [`VerificationResult`](pw_changeset::VerificationResult). A checker that
//! errors or times out is recorded as a failed sub-report; it never aborts
//! the other two.
//!
//! Two checker families ship here: [`HttpChecker`] posts the payload to a
//! remote endpoint, and the [`builtin`] checkers return canned passing
//! reports so a fresh install has working endpoints.

pub mod builtin;
pub mod checker;
pub mod coordinator;
pub mod error;
pub mod http;

pub use checker::{CheckPayload, Checker};
pub use coordinator::VerificationCoordinator;
pub use error::CheckerError;
pub use http::HttpChecker;
