// src/models/mod.rs

pub mod paper;
pub mod question;
pub mod record;
pub mod session;
pub mod user;
