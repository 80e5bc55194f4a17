//! File descriptor limit detection for capping hasher workers (Unix).

/// FD budget per hasher worker: it holds one open file at a time; the rest is headroom for the
/// walker's directory handles and the process's own descriptors.
pub const FDS_PER_WORKER: usize = 4;

/// Fraction of the process FD limit hashers may use.
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Soft limit for open file descriptors, or `None` if unavailable (e.g. Windows).
#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    // RLIM_INFINITY: no practical limit
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Worker count that keeps hashing under ~80% of the FD limit; `None` without a limit.
pub fn max_workers_by_fd_limit() -> Option<usize> {
    let limit = max_open_fds()?;
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    Some((usable / FDS_PER_WORKER).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_cap_stays_within_fd_limit() {
        match (max_open_fds(), max_workers_by_fd_limit()) {
            (Some(limit), Some(workers)) => {
                assert!(workers >= 1);
                assert!(workers == 1 || (workers * FDS_PER_WORKER) as u64 <= limit);
            }
            (None, workers) => assert!(workers.is_none()),
            (Some(_), None) => panic!("a known limit must yield a worker cap"),
        }
    }
}
