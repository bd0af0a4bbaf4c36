// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Linux SG_IO transport
//!
//! Submits CDBs through the SCSI generic driver's `SG_IO` ioctl on a
//! `/dev/sgN` (or any block) node. This is the one place the crate talks
//! to the kernel; everything above it sees the [`Transport`] trait.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::time::Duration;

use linux_raw_sys::ioctl::SG_IO;
use log::debug;
use nix::libc;

use scsi::cdb::DataDirection;
use scsi::tables::host_status;

use crate::transport::{Completion, SubmitArgs, Transport};

// Transfer directions, from scsi/sg.h
const SG_DXFER_NONE: i32 = -1;
const SG_DXFER_TO_DEV: i32 = -2;
const SG_DXFER_FROM_DEV: i32 = -3;

/// `sg_io_hdr` from scsi/sg.h, interface id 'S'.
#[repr(C)]
struct SgIoHdr {
    interface_id: i32,
    dxfer_direction: i32,
    cmd_len: u8,
    mx_sb_len: u8,
    iovec_count: u16,
    dxfer_len: u32,
    dxferp: *mut c_void,
    cmdp: *mut u8,
    sbp: *mut u8,
    timeout: u32,
    flags: u32,
    pack_id: i32,
    usr_ptr: *mut c_void,
    status: u8,
    masked_status: u8,
    msg_status: u8,
    sb_len_wr: u8,
    host_status: u16,
    driver_status: u16,
    resid: i32,
    duration: u32,
    info: u32,
}

/// A pass-through handle to one SCSI generic device node.
pub struct SgTransport {
    file: File,
    path: PathBuf,
    target: String,
}

impl SgTransport {
    /// Open a device node for pass-through access.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::options().read(true).write(true).open(&path)?;
        let target = path.display().to_string();
        debug!("opened {target} for SCSI pass-through");
        Ok(SgTransport { file, path, target })
    }
}

impl Transport for SgTransport {
    fn target(&self) -> &str {
        &self.target
    }

    fn submit(&mut self, io: SubmitArgs<'_>) -> io::Result<Completion> {
        let dxfer_direction = match io.direction {
            DataDirection::None => SG_DXFER_NONE,
            DataDirection::FromDevice => SG_DXFER_FROM_DEV,
            DataDirection::ToDevice => SG_DXFER_TO_DEV,
        };
        let dxfer_len = io.data.len() as u32;
        let mut hdr = SgIoHdr {
            interface_id: 'S' as i32,
            dxfer_direction,
            cmd_len: io.cdb.len() as u8,
            mx_sb_len: io.sense.len() as u8,
            iovec_count: 0,
            dxfer_len,
            dxferp: if io.data.is_empty() {
                std::ptr::null_mut()
            } else {
                io.data.as_mut_ptr().cast()
            },
            cmdp: io.cdb.as_ptr() as *mut u8,
            sbp: io.sense.as_mut_ptr(),
            timeout: io.timeout.as_millis().min(u128::from(u32::MAX)) as u32,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        let res = unsafe { libc::ioctl(self.file.as_raw_fd(), SG_IO as _, &mut hdr) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        let residual = hdr.resid.max(0) as usize;
        Ok(Completion {
            scsi_status: hdr.status,
            host_status: hdr.host_status,
            driver_status: hdr.driver_status,
            os_error: None,
            bytes_transferred: (dxfer_len as usize).saturating_sub(residual),
            residual,
            sense_length: usize::from(hdr.sb_len_wr),
        })
    }

    /// Transport conditions the Linux stack reports as transient: a
    /// disrupted or fail-fast multipath transport, the errno the MPIO
    /// driver returns while a path is gone, and the midlayer's own
    /// requeue suggestions.
    fn is_retriable(&self, completion: &Completion) -> bool {
        matches!(
            completion.host_status,
            host_status::DID_TRANSPORT_DISRUPTED
                | host_status::DID_TRANSPORT_FAILFAST
                | host_status::DID_IMM_RETRY
                | host_status::DID_REQUEUE
        ) || completion.os_error == Some(libc::EAGAIN)
    }

    fn reopen(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(SgTransport::open(&self.path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_kernel_layout() {
        // scsi/sg.h lays the header out to 88 bytes on 64-bit targets
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<SgIoHdr>(), 88);
    }

    #[test]
    fn retriable_set() {
        let transport = match SgTransport::open("/dev/null") {
            Ok(transport) => transport,
            // Not a device node in every environment; skip quietly
            Err(_) => return,
        };
        let mut completion = Completion::default();
        assert!(!transport.is_retriable(&completion));
        completion.host_status = host_status::DID_TRANSPORT_DISRUPTED;
        assert!(transport.is_retriable(&completion));
        completion.host_status = 0;
        completion.os_error = Some(libc::EAGAIN);
        assert!(transport.is_retriable(&completion));
    }
}
