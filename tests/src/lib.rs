//! Integration test framework for nextgamf
#![allow(missing_docs)]
//!
//! This crate provides test utilities and mock components for integration testing
//! of the nextgamf AMF signaling engine.
//!
//! # Components
//!
//! - [`mock_services`] - Mock collaborators: subscriber database, session
//!   management and address allocation
//! - [`fake_radio`] - Fake radio node and UE driving the NGAP task
//! - [`test_fixtures`] - Common test fixtures and configuration helpers
//! - [`test_utils`] - Utility functions for test setup and assertions
//!
//! # Test Categories
//!
//! 1. **Registration Tests** - Initial registration, re-registration, rejects
//! 2. **PDU Session Tests** - Session establishment and release
//! 3. **Service Request Tests** - Idle mode, paging and reconnection
//! 4. **Persistence Tests** - Restart with snapshot restore

pub mod fake_radio;
pub mod mock_services;
pub mod test_fixtures;
pub mod test_utils;

pub use fake_radio::{decode_nas, mm_message, sm_message, FakeRadioNode, FakeUe, TestAmf};
pub use mock_services::{AuthCall, MockServices};
pub use test_fixtures::{test_amf_config, test_supi, test_vector, TEST_IMSI, TEST_IMSI_2, UNKNOWN_IMSI};
pub use test_utils::{init_test_logging, wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT};
