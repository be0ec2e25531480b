#![allow(dead_code)]

pub mod repeater_test;

pub use repeater_test::{RepeaterTest, dmac_sync, default_test_config};
