//! Child process exit status helpers.

use std::process::ExitStatus;

/// Exit code of a finished child. A signal death maps to `128 + signal`,
/// the way shells report it.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
