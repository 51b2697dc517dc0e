//! Collaborator doubles and fixtures for tests.
//!
//! - [`secrets`] counts secrets manager calls, for asserting bundle caching.
//! - [`transport`] replays scripted HTTP replies and records the requests it received.
//! - [`fixtures`] builds records and connections from JSON literals.
//! - [`failpoints`] configures failpoints for the duration of a test.

pub mod failpoints;
pub mod fixtures;
pub mod secrets;
pub mod transport;
