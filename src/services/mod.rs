// src/services/mod.rs

pub mod access;
pub mod grading;
pub mod quiz;
pub mod scoring;
pub mod submission;
