//! Test utilities: a scripted, call-recording backend and result-set helpers.

mod fake;
pub mod test_helpers;

pub use fake::{Event, FakeConnection, FakeHandle};
pub use test_helpers::{create_test_row, result_set};
