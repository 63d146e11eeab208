//! Thin syscall wrappers used by the wakeup pipe and the multiplexer
//!
//! Every wrapper returns the raw errno on failure; callers decide which
//! errnos are transient and how to record the rest.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;

/// errno of the last failed libc call on this thread
#[inline]
pub fn last_errno() -> i32 {
    Errno::last() as i32
}

/// Create a pipe with both ends non-blocking and close-on-exec.
///
/// Returns `(read_end, write_end)`.
pub fn nonblocking_pipe() -> Result<(OwnedFd, OwnedFd), i32> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    raw_pipe(&mut fds)?;
    // Safety: raw_pipe succeeded, both fds are fresh and owned by us.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly",
    ))] {
        fn raw_pipe(fds: &mut [libc::c_int; 2]) -> Result<(), i32> {
            let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
            if ret < 0 {
                return Err(last_errno());
            }
            Ok(())
        }
    } else {
        fn raw_pipe(fds: &mut [libc::c_int; 2]) -> Result<(), i32> {
            let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
            if ret < 0 {
                return Err(last_errno());
            }
            for fd in *fds {
                if let Err(e) = set_nonblocking_cloexec(fd) {
                    unsafe {
                        libc::close(fds[0]);
                        libc::close(fds[1]);
                    }
                    return Err(e);
                }
            }
            Ok(())
        }

        fn set_nonblocking_cloexec(fd: RawFd) -> Result<(), i32> {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                    return Err(last_errno());
                }
                let fd_flags = libc::fcntl(fd, libc::F_GETFD);
                if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
                    return Err(last_errno());
                }
            }
            Ok(())
        }
    }
}

/// `poll(2)` over the whole slice.
///
/// `timeout_ms < 0` blocks indefinitely. Returns the number of entries
/// with non-zero `revents`.
pub fn poll(fds: &mut [libc::pollfd], timeout_ms: libc::c_int) -> Result<usize, i32> {
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        return Err(last_errno());
    }
    Ok(ret as usize)
}

/// Write a single byte.
///
/// A full pipe (`EAGAIN`) or a closed reader (`EPIPE`) is success: a
/// wakeup is already pending, or there is nobody left to wake.
pub fn write_wakeup_byte(fd: RawFd) -> Result<(), i32> {
    let byte: u8 = 1;
    loop {
        let ret = unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
        if ret >= 0 {
            return Ok(());
        }
        match last_errno() {
            libc::EINTR => continue,
            e if e == libc::EAGAIN || e == libc::EWOULDBLOCK || e == libc::EPIPE => return Ok(()),
            e => return Err(e),
        }
    }
}

/// Read and discard everything currently buffered on a non-blocking fd.
///
/// Returns the number of bytes discarded.
pub fn drain(fd: RawFd) -> Result<usize, i32> {
    let mut buf = [0u8; 64];
    let mut total = 0usize;
    loop {
        let ret = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if ret > 0 {
            total += ret as usize;
            continue;
        }
        if ret == 0 {
            // Every writer is gone; nothing more can arrive.
            return Ok(total);
        }
        match last_errno() {
            libc::EINTR => continue,
            e if e == libc::EAGAIN || e == libc::EWOULDBLOCK => return Ok(total),
            e => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_pipe_is_nonblocking() {
        let (read, _write) = nonblocking_pipe().unwrap();
        // Empty non-blocking pipe: drain returns immediately with nothing.
        assert_eq!(drain(read.as_raw_fd()), Ok(0));
    }

    #[test]
    fn test_write_then_drain() {
        let (read, write) = nonblocking_pipe().unwrap();
        for _ in 0..3 {
            write_wakeup_byte(write.as_raw_fd()).unwrap();
        }
        assert_eq!(drain(read.as_raw_fd()), Ok(3));
        assert_eq!(drain(read.as_raw_fd()), Ok(0));
    }

    #[test]
    fn test_full_pipe_is_not_an_error() {
        let (_read, write) = nonblocking_pipe().unwrap();
        // Default pipe buffers are at most a few hundred KiB.
        for _ in 0..(1 << 20) {
            write_wakeup_byte(write.as_raw_fd()).unwrap();
        }
    }

    #[test]
    fn test_closed_reader_is_not_an_error() {
        let (read, write) = nonblocking_pipe().unwrap();
        drop(read);
        assert_eq!(write_wakeup_byte(write.as_raw_fd()), Ok(()));
    }

    #[test]
    fn test_poll_timeout_zero() {
        let (read, _write) = nonblocking_pipe().unwrap();
        let mut fds = [libc::pollfd {
            fd: read.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        assert_eq!(poll(&mut fds, 0), Ok(0));
        assert_eq!(fds[0].revents, 0);
    }
}
