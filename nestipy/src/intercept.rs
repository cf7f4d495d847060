//! Descriptor-level redirection of our own stdout/stderr.
//!
//! The backend server inherits descriptors 1 and 2. While a
//! [`StreamInterceptor`] is alive both point at pipes; a reader thread per
//! pipe rewrites every line and writes it to a saved copy of the original
//! descriptor. Dropping the interceptor restores the originals.

use std::io::{self, Read, Write};
#[cfg(unix)]
use std::time::Duration;

use nestipy_core::{LineBuffer, LineSplit, rewrite_line};
use thiserror::Error;

const READ_CHUNK: usize = 8192;
#[cfg(unix)]
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Failed to duplicate descriptor {fd}: {source}")]
    Dup { fd: i32, source: io::Error },

    #[error("Failed to create pipe: {0}")]
    Pipe(io::Error),

    #[error("Failed to redirect descriptor {fd}: {source}")]
    Redirect { fd: i32, source: io::Error },

    #[error("Failed to start reader thread: {0}")]
    Thread(io::Error),

    #[error("Output interception is not supported on this platform")]
    Unsupported,
}

/// Copy `reader` to `writer` line by line through [`rewrite_line`]. The
/// trailing partial line is written without a newline.
pub fn pump<R: Read, W: Write>(mut reader: R, mut writer: W, use_color: bool) {
    let mut buffer = LineBuffer::new(LineSplit::Newline);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        for line in buffer.push(&chunk[..n]) {
            let _ = writeln!(writer, "{}", rewrite_line(&line, use_color));
        }
        let _ = writer.flush();
    }
    if let Some(rest) = buffer.finish() {
        let _ = write!(writer, "{}", rewrite_line(&rest, use_color));
    }
    let _ = writer.flush();
}

#[cfg(unix)]
mod imp {
    use std::fs::File;
    use std::io::{self, Write};
    use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

    use super::{InterceptError, READER_JOIN_TIMEOUT, pump};
    use crate::threads::TrackedThread;

    struct SavedFd {
        target: RawFd,
        original: OwnedFd,
    }

    pub struct StreamInterceptor {
        saved: Vec<SavedFd>,
        readers: Vec<TrackedThread>,
    }

    fn flush_std() {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    impl StreamInterceptor {
        pub fn install(use_color: bool) -> Result<Self, InterceptError> {
            flush_std();
            let mut interceptor = Self {
                saved: Vec::with_capacity(2),
                readers: Vec::with_capacity(2),
            };
            // On error the partially built interceptor is dropped, which
            // restores whatever was already redirected.
            for fd in [libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                interceptor.redirect(fd, use_color)?;
            }
            Ok(interceptor)
        }

        fn redirect(&mut self, fd: RawFd, use_color: bool) -> Result<(), InterceptError> {
            // Duplicates are close-on-exec; the backend only inherits fd 1/2.
            let original = unsafe { BorrowedFd::borrow_raw(fd) }
                .try_clone_to_owned()
                .map_err(|source| InterceptError::Dup { fd, source })?;
            let output = original
                .try_clone()
                .map_err(|source| InterceptError::Dup { fd, source })?;
            let (read_end, write_end) = io::pipe().map_err(InterceptError::Pipe)?;

            let reader = TrackedThread::spawn(format!("intercept-fd{fd}"), move || {
                pump(read_end, File::from(output), use_color)
            })
            .map_err(InterceptError::Thread)?;
            self.readers.push(reader);

            if unsafe { libc::dup2(write_end.as_raw_fd(), fd) } == -1 {
                return Err(InterceptError::Redirect {
                    fd,
                    source: io::Error::last_os_error(),
                });
            }
            self.saved.push(SavedFd {
                target: fd,
                original,
            });
            Ok(())
        }
    }

    impl Drop for StreamInterceptor {
        fn drop(&mut self) {
            flush_std();
            for saved in self.saved.drain(..).rev() {
                if unsafe { libc::dup2(saved.original.as_raw_fd(), saved.target) } == -1 {
                    let err = io::Error::last_os_error();
                    tracing::warn!(fd = saved.target, "failed to restore descriptor: {err}");
                }
            }
            // The pipes' last write ends closed above; readers see EOF unless
            // a straggling child still holds them.
            for reader in self.readers.drain(..) {
                reader.join_timeout(READER_JOIN_TIMEOUT);
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::InterceptError;

    pub struct StreamInterceptor;

    impl StreamInterceptor {
        pub fn install(_use_color: bool) -> Result<Self, InterceptError> {
            Err(InterceptError::Unsupported)
        }
    }
}

pub use imp::StreamInterceptor;
