//! Crash/hang isolation for vendor-SDK calls.
//!
//! NVML can deadlock inside the driver stack. `safe_call_with_timeout` runs a
//! closure in a way that can be killed from the outside if it doesn't return
//! within `deadline`, so a wedged driver never freezes the UI thread.
//!
//! On Unix this forks: the child executes the closure and writes a
//! plain-old-data result over a pipe, the parent `select()`s with a timeout
//! and `SIGKILL`s the child if it doesn't hear back in time. `T` must not own
//! heap pointers — callers pass `#[repr(C)]` `Opt*Msg` structs and copy any
//! string data into fixed-size buffers before crossing the fork boundary
//! (see `dynload::nvml`).
//!
//! On Windows there's no fork; the closure runs on a dedicated worker thread
//! and the caller waits on a channel with a timeout. A wedged call leaks that
//! thread (accepted: see spec §9 "Open questions").

use std::time::Duration;

/// Default NVML call deadline.
pub const NVML_CALL_TIMEOUT: Duration = Duration::from_millis(700);

#[cfg(unix)]
pub fn safe_call_with_timeout<T, F>(deadline: Duration, f: F) -> Option<T>
where
    T: Copy + Send + 'static,
    F: FnOnce() -> T,
{
    unix_impl::run(deadline, f)
}

#[cfg(not(unix))]
pub fn safe_call_with_timeout<T, F>(deadline: Duration, f: F) -> Option<T>
where
    T: Copy + Send + 'static,
    F: FnOnce() -> T,
{
    windows_impl::run(deadline, f)
}

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use nix::sys::select::{select, FdSet};
    use nix::sys::signal::{kill, Signal};
    use nix::sys::time::TimeVal;
    use nix::sys::wait::{waitpid, WaitPidFlag};
    use nix::unistd::{close, fork, pipe, read, write, ForkResult, Pid};
    use std::os::unix::io::{AsRawFd, RawFd};

    pub fn run<T, F>(deadline: Duration, f: F) -> Option<T>
    where
        T: Copy + Send + 'static,
        F: FnOnce() -> T,
    {
        let (read_fd, write_fd) = pipe().ok()?;

        // SAFETY: the child only calls async-signal-unsafe code paths that
        // are accepted here because the child never returns to user code
        // beyond writing its result and exiting.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let _ = close(read_fd);
                let result = f();
                // SAFETY: T is Copy and contains no heap pointers by
                // contract; reinterpreting it as bytes for the pipe is valid.
                let bytes = unsafe {
                    std::slice::from_raw_parts(
                        &result as *const T as *const u8,
                        std::mem::size_of::<T>(),
                    )
                };
                let _ = write(write_fd, bytes);
                let _ = close(write_fd);
                std::process::exit(0);
            }
            Ok(ForkResult::Parent { child }) => {
                let _ = close(write_fd);
                let result = wait_for_result::<T>(read_fd, child, deadline);
                let _ = close(read_fd);
                result
            }
            Err(_) => {
                let _ = close(read_fd);
                let _ = close(write_fd);
                None
            }
        }
    }

    fn wait_for_result<T: Copy>(read_fd: RawFd, child: Pid, deadline: Duration) -> Option<T> {
        let mut fdset = FdSet::new();
        fdset.insert(read_fd);
        let mut tv = TimeVal::new(
            deadline.as_secs() as i64,
            (deadline.subsec_micros()) as i64,
        );

        let ready = select(
            read_fd.as_raw_fd() + 1,
            Some(&mut fdset),
            None,
            None,
            Some(&mut tv),
        );

        match ready {
            Ok(n) if n > 0 && fdset.contains(read_fd) => {
                let mut buf = vec![0u8; std::mem::size_of::<T>()];
                let mut got = 0usize;
                while got < buf.len() {
                    match read(read_fd, &mut buf[got..]) {
                        Ok(0) => break,
                        Ok(n) => got += n,
                        Err(_) => break,
                    }
                }
                let _ = waitpid(child, Some(WaitPidFlag::WNOHANG));
                if got == buf.len() {
                    // SAFETY: buf has exactly size_of::<T>() initialized
                    // bytes written by a child that produced a valid T.
                    Some(unsafe { std::ptr::read(buf.as_ptr() as *const T) })
                } else {
                    None
                }
            }
            _ => {
                let _ = kill(child, Signal::SIGKILL);
                let _ = waitpid(child, None);
                None
            }
        }
    }
}

#[cfg(not(unix))]
mod windows_impl {
    use super::*;
    use std::sync::mpsc;

    pub fn run<T, F>(deadline: Duration, f: F) -> Option<T>
    where
        T: Copy + Send + 'static,
        F: FnOnce() -> T,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(deadline).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_call_returns_value() {
        let v = safe_call_with_timeout(Duration::from_millis(200), || 42u32);
        assert_eq!(v, Some(42));
    }

    #[test]
    fn slow_call_times_out() {
        let v = safe_call_with_timeout(Duration::from_millis(100), || {
            std::thread::sleep(Duration::from_secs(2));
            7u32
        });
        assert_eq!(v, None);
    }
}
