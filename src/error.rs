use thiserror::Error;

/// # Description
/// the error taxonomy of the harness. nothing here is fatal to a run:
/// every failure travels back as a value so the caller can record the
/// case as failed and keep going with the remaining cases.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    /// malformed matrix dimensions, surfaced immediately to the caller
    #[error("invalid matrix shape: {rows}x{cols}")]
    InvalidShape { rows: usize, cols: usize },

    /// a decode was asked for a degenerate region
    #[error("cannot decode a {rows}x{cols} region at 0x{base:08x}")]
    OutOfRange { base: u32, rows: usize, cols: usize },

    /// a unit failed to clear its busy flag within budget
    #[error("unit {unit} still busy after {cycles} cycles")]
    OperationTimeout { unit: usize, cycles: u64 },
}
