//! POSIX shared memory mailboxes.
//!
//! Each region and each event is its own `shm_open` object mapped with
//! `mmap`. An event is a `u32` state word (0 clear, 1 set) at the start of its
//! mapping. On Linux waiters park on a process-shared futex; elsewhere they
//! poll the word at `ShmConfig::poll_interval`.
//!
//! The creator always publishes fresh objects and unlinks them on drop only
//! while the names still point at them; attaching never creates anything.

use std::ffi::CString;
use std::io;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use libc::{MAP_SHARED, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, PROT_READ, PROT_WRITE, S_IRUSR, S_IWUSR};
use libc::{c_uint, c_void, dev_t, ino_t, mode_t, off_t, size_t};
use libc::{close, fstat, ftruncate, mmap, munmap, shm_open, shm_unlink};
use tracing::{debug, warn};

use super::{Mailbox, MailboxBackend, WaitOutcome};
use crate::ShmConfig;
use crate::protocol::{Error, QueryRecord, RECORD_SIZE, Result};

const EVENT_SIZE: usize = std::mem::size_of::<AtomicU32>();
const CLEAR: u32 = 0;
const SET: u32 = 1;

/// Backend publishing mailboxes as POSIX shared memory objects.
#[derive(Debug, Clone, Default)]
pub struct ShmBackend {
    config: ShmConfig,
}

impl ShmBackend {
    /// Create a backend with the given options.
    #[must_use]
    pub const fn new(config: ShmConfig) -> Self {
        Self { config }
    }

    fn open(&self, region: &str, event: &str, owner: bool) -> Result<ShmMailbox> {
        let region_map = SharedMapping::open(region, RECORD_SIZE, owner)?;
        let event_map = SharedMapping::open(event, EVENT_SIZE, owner)?;
        let mailbox = ShmMailbox {
            name: region.to_owned(),
            region: region_map,
            event: event_map,
            poll_interval: self.config.poll_interval,
        };
        if owner {
            mailbox.state().store(CLEAR, Ordering::Release);
        }
        Ok(mailbox)
    }
}

impl MailboxBackend for ShmBackend {
    type Mailbox = ShmMailbox;

    fn create(&self, region: &str, event: &str) -> Result<ShmMailbox> {
        self.open(region, event, true)
    }

    fn attach(&self, region: &str, event: &str) -> Result<ShmMailbox> {
        self.open(region, event, false)
    }
}

/// One `shm_open` object mapped read/write.
#[derive(Debug)]
struct SharedMapping {
    ptr: *mut c_void,
    len: usize,
    name: CString,
    /// Device and inode of the mapped object
    identity: (dev_t, ino_t),
    /// Unlink the object when dropped (creator side only)
    owner: bool,
}

impl SharedMapping {
    /// Map `name`. The creator replaces any object already published under
    /// the name; other callers require one to exist.
    #[allow(unsafe_code)]
    fn open(name: &str, len: usize, owner: bool) -> Result<Self> {
        // POSIX shm names must start with '/'
        let shm_name = if name.starts_with('/') {
            name.to_owned()
        } else {
            format!("/{name}")
        };
        let c_name = CString::new(shm_name.clone()).map_err(|e| {
            Error::unavailable(&shm_name, io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        let fd = if owner {
            // A mapping left behind by an earlier creator (for instance a
            // listener that outlived its bridge) keeps the old object; the
            // name moves to a fresh one.
            unsafe { shm_unlink(c_name.as_ptr()) };
            unsafe {
                shm_open(
                    c_name.as_ptr(),
                    O_CREAT | O_EXCL | O_RDWR,
                    (S_IRUSR | S_IWUSR) as mode_t as c_uint,
                )
            }
        } else {
            unsafe { shm_open(c_name.as_ptr(), O_RDWR, 0) }
        };
        if fd == -1 {
            return Err(Error::unavailable(shm_name, io::Error::last_os_error()));
        }

        let wanted = off_t::try_from(len).unwrap_or(off_t::MAX);
        if owner && unsafe { ftruncate(fd, wanted) } == -1 {
            let err = io::Error::last_os_error();
            unsafe { close(fd) };
            return Err(Error::unavailable(shm_name, err));
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { fstat(fd, &raw mut stat) } == -1 {
            let err = io::Error::last_os_error();
            unsafe { close(fd) };
            return Err(Error::unavailable(shm_name, err));
        }
        // Mapping past the end of a short object faults on first access
        if stat.st_size < wanted {
            unsafe { close(fd) };
            return Err(Error::unavailable(
                shm_name,
                io::Error::new(io::ErrorKind::InvalidData, "object not initialised"),
            ));
        }

        let ptr = unsafe {
            mmap(
                ptr::null_mut(),
                len as size_t,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd,
                0,
            )
        };
        // The mapping keeps the object alive; the descriptor is no longer needed
        let map_err = (ptr == libc::MAP_FAILED).then(io::Error::last_os_error);
        unsafe { close(fd) };
        if let Some(err) = map_err {
            return Err(Error::unavailable(shm_name, err));
        }

        if owner {
            unsafe { ptr::write_bytes(ptr.cast::<u8>(), 0, len) };
        }
        debug!(name = %shm_name, len, owner, "mapped shared memory");

        Ok(Self {
            ptr,
            len,
            name: c_name,
            identity: (stat.st_dev, stat.st_ino),
            owner,
        })
    }

    /// Whether the name still refers to the object this value maps.
    #[allow(unsafe_code)]
    fn still_published(&self) -> bool {
        let fd = unsafe { shm_open(self.name.as_ptr(), O_RDONLY, 0) };
        if fd == -1 {
            return false;
        }
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let ok = unsafe { fstat(fd, &raw mut stat) } == 0;
        unsafe { close(fd) };
        ok && (stat.st_dev, stat.st_ino) == self.identity
    }
}

impl Drop for SharedMapping {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        unsafe { munmap(self.ptr, self.len as size_t) };
        if !self.owner {
            return;
        }
        if !self.still_published() {
            debug!(name = ?self.name, "name taken over by a newer creator; not unlinking");
            return;
        }
        if unsafe { shm_unlink(self.name.as_ptr()) } == -1 {
            warn!(
                name = ?self.name,
                error = %io::Error::last_os_error(),
                "failed to unlink shared memory"
            );
        }
    }
}

// SAFETY: the pointer targets a MAP_SHARED mapping that lives as long as the
// value; all access goes through copies or the atomic state word.
#[allow(unsafe_code)]
unsafe impl Send for SharedMapping {}

// SAFETY: see above. Concurrent record copies are governed by the signal
// protocol, not by Rust's aliasing rules.
#[allow(unsafe_code)]
unsafe impl Sync for SharedMapping {}

/// Mailbox backed by two POSIX shared memory objects.
#[derive(Debug)]
pub struct ShmMailbox {
    name: String,
    region: SharedMapping,
    event: SharedMapping,
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    poll_interval: Duration,
}

impl ShmMailbox {
    #[allow(unsafe_code)]
    fn state(&self) -> &AtomicU32 {
        // mmap returns page-aligned memory, which satisfies AtomicU32
        unsafe { &*self.event.ptr.cast::<AtomicU32>() }
    }

    #[cfg(target_os = "linux")]
    #[allow(unsafe_code)]
    fn park(&self, remaining: Duration) {
        let timeout = libc::timespec {
            tv_sec: libc::time_t::try_from(remaining.as_secs()).unwrap_or(libc::time_t::MAX),
            tv_nsec: libc::c_long::from(remaining.subsec_nanos() as i32),
        };
        // Returns early on wake-up, on EINTR, or with EAGAIN when the word is
        // no longer CLEAR; the caller re-checks in every case.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.state().as_ptr(),
                libc::FUTEX_WAIT,
                CLEAR,
                &raw const timeout,
                ptr::null::<u32>(),
                0u32,
            );
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn park(&self, remaining: Duration) {
        std::thread::sleep(remaining.min(self.poll_interval));
    }

    #[cfg(target_os = "linux")]
    #[allow(unsafe_code)]
    fn wake_all(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.state().as_ptr(),
                libc::FUTEX_WAKE,
                libc::c_int::MAX,
            );
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn wake_all(&self) {}
}

impl Mailbox for ShmMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(unsafe_code)]
    fn write_record(&self, record: &QueryRecord) -> Result<()> {
        let bytes = record.to_bytes();
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.region.ptr.cast::<u8>(), RECORD_SIZE);
        }
        Ok(())
    }

    #[allow(unsafe_code)]
    fn read_record(&self) -> Result<QueryRecord> {
        let mut bytes = [0u8; RECORD_SIZE];
        unsafe {
            ptr::copy_nonoverlapping(
                self.region.ptr.cast::<u8>().cast_const(),
                bytes.as_mut_ptr(),
                RECORD_SIZE,
            );
        }
        QueryRecord::from_bytes(&bytes)
    }

    fn signal(&self) -> Result<()> {
        // Release: the record copied in before this store is visible to a
        // reader that observes SET with Acquire.
        self.state().store(SET, Ordering::Release);
        self.wake_all();
        Ok(())
    }

    fn wait_signaled(&self, timeout: Duration) -> Result<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state().load(Ordering::Acquire) == SET {
                return Ok(WaitOutcome::Signaled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(WaitOutcome::TimedOut);
            }
            self.park(remaining);
        }
    }

    fn reset_signal(&self) -> Result<()> {
        self.state().store(CLEAR, Ordering::Release);
        Ok(())
    }
}
