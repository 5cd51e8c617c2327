//! Error handling utilities

use tracing::error;

/// Report a fatal error and exit with the matching status code.
///
/// `FlowError`s carry their own exit code; anything else exits with 1.
/// With `verbose >= 1` the full cause chain is printed as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::FlowError;

    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    let exit_code = error
        .downcast_ref::<FlowError>()
        .map(FlowError::exit_code)
        .unwrap_or(1);

    std::process::exit(exit_code)
}
