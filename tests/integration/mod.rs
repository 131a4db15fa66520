//! Integration test modules.

mod config_test;
mod ride_session_test;
mod sensor_mock;
