//! Test module organization for traffic collection

pub mod validation_tests;
