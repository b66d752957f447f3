// src/services/mod.rs

//! Exam attempt lifecycle. Everything here is independent of HTTP; handlers
//! only translate requests into these calls.

pub mod locks;
pub mod paper;
pub mod ranking;
pub mod resync;
pub mod rules;
pub mod scoring;
pub mod session;
pub mod submission;
