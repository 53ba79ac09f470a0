//! Integration Test: Sleep Prohibition
//!
//! Library code waits on I/O, queues and notifications. It never sleeps to
//! poll or to paper over ordering.
//!
//! **Exceptions**: test code, and `tokio::time::timeout` (a deadline on an
//! awaited operation, not a sleep).

use architectural_enforcement::{report, scan};

#[test]
fn test_no_sleep_in_library_code() {
    let violations = scan(|code| code.contains("::sleep(") || code.contains(".sleep("));
    report("No sleep in library code", &violations);
}

#[test]
fn test_no_blocking_thread_primitives() {
    let violations = scan(|code| {
        code.contains("std::thread::sleep")
            || code.contains("std::sync::Mutex")
            || code.contains("std::sync::RwLock")
    });
    report("Use parking_lot or tokio sync primitives", &violations);
}
