//! Integration Test: Logging and Error Propagation
//!
//! Library code reports through `tracing` and returns errors to callers.
//! Printing to stdout/stderr or panicking on a `None`/`Err` is reserved for
//! tests and the binary.

use architectural_enforcement::{report, scan};

#[test]
fn test_no_print_macros_in_library_code() {
    let violations = scan(|code| {
        code.contains("println!") || code.contains("eprintln!") || code.contains("dbg!")
    });
    report("Log with tracing instead of printing", &violations);
}

#[test]
fn test_no_unwrap_or_expect_in_library_code() {
    let violations = scan(|code| code.contains(".unwrap()") || code.contains(".expect("));
    report("Propagate errors instead of unwrapping", &violations);
}
