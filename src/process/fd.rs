//! File-descriptor plumbing
//!
//! Thin wrappers over the raw syscalls with EINTR retry loops. All fd
//! manipulation in the shell goes through these, so the retry and
//! error-mapping policy lives in one place.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

pub fn pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

/// Duplicate `fd` to the lowest free descriptor at or above `min`. The
/// copy is close-on-exec: saved descriptors must not leak into executed
/// programs.
pub fn dup_above(fd: RawFd, min: RawFd) -> io::Result<RawFd> {
    loop {
        let r = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, min) };
        if r != -1 {
            return Ok(r);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

pub fn dup2(from: RawFd, to: RawFd) -> io::Result<()> {
    loop {
        if unsafe { libc::dup2(from, to) } != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

pub fn close(fd: RawFd) {
    // EBADF after an exec failure is uninteresting; EINTR on close must
    // not be retried (the fd state is unspecified).
    unsafe { libc::close(fd) };
}

pub fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let r = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if r >= 0 {
            return Ok(r as usize);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

pub fn write_fd(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    loop {
        let r = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if r >= 0 {
            return Ok(r as usize);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// Write the whole buffer; EPIPE is reported to the caller, who treats it
/// as normal pipeline termination.
pub fn write_all(fd: RawFd, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = write_fd(fd, buf)?;
        buf = &buf[n..];
    }
    Ok(())
}

/// Drain a descriptor to a byte buffer.
pub fn read_to_end(fd: RawFd) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = read_fd(fd, &mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

pub fn open(path: &str, flags: libc::c_int, mode: libc::mode_t) -> io::Result<RawFd> {
    let c_path = CString::new(path)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    loop {
        let r = unsafe { libc::open(c_path.as_ptr(), flags, mode as libc::c_uint) };
        if r != -1 {
            return Ok(r);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// Is the descriptor open?
pub fn is_open(fd: RawFd) -> bool {
    (unsafe { libc::fcntl(fd, libc::F_GETFD) }) != -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_roundtrip() {
        let (r, w) = pipe().unwrap();
        write_all(w, b"hello").unwrap();
        close(w);
        let data = read_to_end(r).unwrap();
        close(r);
        assert_eq!(data, b"hello");
    }

    #[test]
    fn dup_above_lands_high() {
        let (r, w) = pipe().unwrap();
        let dup = dup_above(r, 10).unwrap();
        assert!(dup >= 10);
        close(dup);
        close(r);
        close(w);
    }
}
