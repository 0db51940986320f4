//! RK Document command line driver
//!
//! Library half of `rkdoc`, so that the commands can be tested without
//! spawning the binary.

pub mod commands;
