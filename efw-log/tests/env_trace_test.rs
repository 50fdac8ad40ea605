//! `EFW_LOG_LEVEL` applies before any record has been written.

use efw_log::{Level, enabled, threshold};

#[test]
fn test_trace_level_from_environment() {
    // SAFETY: the only test in this binary; nothing else reads the
    // environment concurrently.
    unsafe {
        std::env::set_var("EFW_LOG_LEVEL", "trace");
        std::env::remove_var("EFW_DEBUG");
    }

    assert!(enabled(Level::Trace));
    assert_eq!(threshold(), Level::Trace);

    efw_log::info!("first record");
    assert!(enabled(Level::Trace));
}
