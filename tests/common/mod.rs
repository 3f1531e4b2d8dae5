#![allow(dead_code)]

pub use webext_test_utils::builders;
pub use webext_test_utils::fake_launcher::FakeLauncher;
pub use webext_test_utils::{init_tracing, with_timeout};

use std::sync::Arc;

use webext_supervisor::engine::Supervisor;
use webext_test_utils::builders::fast_runner;

/// Supervisor wired to a fresh fake launcher.
pub fn fake_supervisor() -> (Supervisor, FakeLauncher) {
    let launcher = FakeLauncher::new();
    let supervisor = Supervisor::new(fast_runner(), Arc::new(launcher.clone()));
    (supervisor, launcher)
}

/// Parse the watch file's timestamp.
pub fn read_stamp(path: &std::path::Path) -> u128 {
    std::fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}
