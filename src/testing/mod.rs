//! Testing infrastructure for takt.
//!
//! Mocks for the two remote boundaries and canned data, shared by the unit
//! tests, the integration tests under `tests/`, and the benchmarks.
//!
//! # Architecture
//!
//! - **Mocks**: [`MockTaskApi`] (in-memory server with failure injection,
//!   call log, and request holds) and [`MockPushConnector`] (scripted push
//!   sessions)
//! - **Fixtures**: the standard zone forest, task 42, sample and generated
//!   task sets
//!
//! # Example
//!
//! ```rust,ignore
//! use takt::testing::{fixtures, Endpoint, MockTaskApi};
//!
//! let api = MockTaskApi::new()
//!     .with_zones(fixtures::zone_forest())
//!     .with_tasks(fixtures::sample_tasks());
//! api.fail_next(Endpoint::UpdateTask, ApiError::status(500, "boom"));
//! ```

pub mod fixtures;
pub mod mocks;

pub use mocks::{
    ApiCall, Endpoint, HoldKey, HoldRelease, MockPushConnector, MockTaskApi, PushSession,
    FIRST_CREATED_ID,
};
