//! Win32 named file mappings and manual-reset events.

use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use std::time::Duration;

use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::WAIT_TIMEOUT;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::memoryapi::{
    CreateFileMappingW, FILE_MAP_ALL_ACCESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use winapi::um::synchapi::{
    CreateEventW, OpenEventW, ResetEvent, SetEvent, WaitForSingleObject,
};
use winapi::um::winbase::WAIT_OBJECT_0;
use winapi::um::winnt::{EVENT_MODIFY_STATE, HANDLE, PAGE_READWRITE, SYNCHRONIZE};

use super::{Mailbox, MailboxBackend, WaitOutcome};
use crate::ShmConfig;
use crate::protocol::{Error, QueryRecord, RECORD_SIZE, Result};

/// Backend publishing mailboxes as Win32 named objects.
///
/// Win32 events block natively, so [`ShmConfig::poll_interval`] is unused.
/// Attaching opens existing objects only. Named objects live until their last
/// handle closes, so a listener that outlives its bridge keeps sharing them
/// with a restarted one; clients discard replies that do not answer their
/// own request.
#[derive(Debug, Clone, Default)]
pub struct ShmBackend;

impl ShmBackend {
    /// Create a backend with the given options.
    #[must_use]
    pub fn new(_config: ShmConfig) -> Self {
        Self
    }

    #[allow(unsafe_code)]
    fn open(&self, region: &str, event: &str, owner: bool) -> Result<ShmMailbox> {
        let region_name = wide(region);
        let mapping = if owner {
            unsafe {
                CreateFileMappingW(
                    INVALID_HANDLE_VALUE,
                    ptr::null_mut(),
                    PAGE_READWRITE,
                    0,
                    RECORD_SIZE as DWORD,
                    region_name.as_ptr(),
                )
            }
        } else {
            unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, FALSE, region_name.as_ptr()) }
        };
        if mapping.is_null() {
            return Err(Error::unavailable(region, io::Error::last_os_error()));
        }
        let mapping = OwnedHandle(mapping);

        let view = unsafe { MapViewOfFile(mapping.0, FILE_MAP_ALL_ACCESS, 0, 0, RECORD_SIZE) };
        if view.is_null() {
            return Err(Error::unavailable(region, io::Error::last_os_error()));
        }
        let view = View(view.cast::<u8>());

        let event_name = wide(event);
        let handle = if owner {
            unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, event_name.as_ptr()) }
        } else {
            unsafe { OpenEventW(EVENT_MODIFY_STATE | SYNCHRONIZE, FALSE, event_name.as_ptr()) }
        };
        if handle.is_null() {
            return Err(Error::unavailable(event, io::Error::last_os_error()));
        }
        let event_handle = OwnedHandle(handle);

        if owner {
            unsafe {
                ptr::write_bytes(view.0, 0, RECORD_SIZE);
                ResetEvent(event_handle.0);
            }
        }
        debug!(region, event, owner, "opened named mailbox");

        Ok(ShmMailbox {
            name: region.to_owned(),
            view,
            _mapping: mapping,
            event: event_handle,
        })
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

fn wide(name: &str) -> Vec<u16> {
    OsStr::new(name).encode_wide().chain(Some(0)).collect()
}

#[derive(Debug)]
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

#[derive(Debug)]
struct View(*mut u8);

impl Drop for View {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        unsafe { UnmapViewOfFile(self.0.cast()) };
    }
}

/// Mailbox backed by a named file mapping and a named event.
#[derive(Debug)]
pub struct ShmMailbox {
    name: String,
    // Field order matters: the view is unmapped before its mapping closes
    view: View,
    _mapping: OwnedHandle,
    event: OwnedHandle,
}

// SAFETY: kernel handles and the mapped view are valid from any thread.
#[allow(unsafe_code)]
unsafe impl Send for ShmMailbox {}

// SAFETY: record copies are governed by the signal protocol; the event
// handle is thread-safe.
#[allow(unsafe_code)]
unsafe impl Sync for ShmMailbox {}

impl Mailbox for ShmMailbox {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(unsafe_code)]
    fn write_record(&self, record: &QueryRecord) -> Result<()> {
        let bytes = record.to_bytes();
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.view.0, RECORD_SIZE) };
        Ok(())
    }

    #[allow(unsafe_code)]
    fn read_record(&self) -> Result<QueryRecord> {
        let mut bytes = [0u8; RECORD_SIZE];
        unsafe { ptr::copy_nonoverlapping(self.view.0.cast_const(), bytes.as_mut_ptr(), RECORD_SIZE) };
        QueryRecord::from_bytes(&bytes)
    }

    #[allow(unsafe_code)]
    fn signal(&self) -> Result<()> {
        if unsafe { SetEvent(self.event.0) } == 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    #[allow(unsafe_code)]
    fn wait_signaled(&self, timeout: Duration) -> Result<WaitOutcome> {
        let millis = DWORD::try_from(timeout.as_millis()).unwrap_or(DWORD::MAX - 1);
        match unsafe { WaitForSingleObject(self.event.0, millis) } {
            WAIT_OBJECT_0 => Ok(WaitOutcome::Signaled),
            WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
            _ => Err(io::Error::last_os_error().into()),
        }
    }

    #[allow(unsafe_code)]
    fn reset_signal(&self) -> Result<()> {
        if unsafe { ResetEvent(self.event.0) } == 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}
