// ABOUTME: Configuration and constants for the Cirno interpreter

#[allow(dead_code)]
pub const VERSION: &str = "1.0.0";

/// Size in bytes of the preallocated stack block that backs locals and
/// parameters. Declarations that would push a scope's running offset past
/// this budget are an out-of-memory diagnostic.
pub const STACK_SIZE: usize = 1024;

/// Width in bytes of one storage slot. Numbers store their 4-byte machine
/// representation; reference types store a heap block handle in the same
/// width, with 0 meaning null.
pub const SLOT_SIZE: usize = 4;
