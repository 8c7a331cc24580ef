//! Interface devices
//!
//! The pump treats the virtual interface as a duplex stream of whole IP
//! frames. Setting the interface up (addresses, routes, permissions) is the
//! host's job; by the time a device reaches the pump it is ready to read.
//!
//! Reads must come back at least once per poll interval (returning
//! `TimedOut` / `WouldBlock` when idle) so that a stop request is noticed
//! within one read cycle.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::io;
use std::time::Duration;

/// A virtual network interface, one IP frame per read/write
pub trait TunDevice: Send + 'static {
    /// Read one frame into `buf`, returning its length.
    ///
    /// `Ok(0)` is a zero-length read and is skipped. `TimedOut`,
    /// `WouldBlock` and `Interrupted` mean "nothing yet". Any other error
    /// means the interface is gone.
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one frame
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Acquires a device when the pump starts
pub trait DeviceConnector: Send {
    type Device: TunDevice;

    fn connect(&mut self) -> io::Result<Self::Device>;
}

impl<F, D> DeviceConnector for F
where
    F: FnMut() -> io::Result<D> + Send,
    D: TunDevice,
{
    type Device = D;

    fn connect(&mut self) -> io::Result<D> {
        self()
    }
}

/// Whether a read error is an idle wakeup rather than a closed device
pub fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// In-process device backed by channels.
///
/// Frames pushed into [`DeviceHandle::inject`] are read by the pump;
/// forwarded frames come out of [`DeviceHandle::output`]. Used for
/// embedding the engine behind another packet source, and in tests.
#[derive(Debug)]
pub struct ChannelDevice {
    inbound: Receiver<Vec<u8>>,
    outbound: Sender<Vec<u8>>,
    poll_interval: Duration,
}

/// The far side of a [`ChannelDevice`]
#[derive(Clone)]
pub struct DeviceHandle {
    /// Frames to be read by the pump
    pub inject: Sender<Vec<u8>>,
    /// Frames the pump forwarded
    pub output: Receiver<Vec<u8>>,
}

impl ChannelDevice {
    /// Create a connected device/handle pair
    pub fn pair(poll_interval: Duration) -> (Self, DeviceHandle) {
        let (inject, inbound) = unbounded();
        let (outbound, output) = unbounded();
        (
            Self {
                inbound,
                outbound,
                poll_interval,
            },
            DeviceHandle { inject, output },
        )
    }
}

impl TunDevice for ChannelDevice {
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inbound.recv_timeout(self.poll_interval) {
            Ok(frame) => {
                // Oversized frames are truncated like a short read buffer would
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Err(RecvTimeoutError::Timeout) => Err(io::ErrorKind::TimedOut.into()),
            Err(RecvTimeoutError::Disconnected) => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[cfg(unix)]
pub use self::fd::FdDevice;

#[cfg(unix)]
mod fd {
    use super::TunDevice;
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::fd::{AsRawFd, FromRawFd, RawFd};
    use std::path::Path;
    use std::time::Duration;

    /// Device over an already-configured interface file descriptor.
    ///
    /// Reads wait in `poll(2)` for at most the poll interval.
    #[derive(Debug)]
    pub struct FdDevice {
        file: File,
        poll_timeout_ms: libc::c_int,
    }

    impl FdDevice {
        /// Open a device node or FIFO that yields one frame per read
        pub fn open(path: &Path, poll_interval: Duration) -> io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            Ok(Self::from_file(file, poll_interval))
        }

        /// Adopt a descriptor handed over by the process that created the
        /// interface.
        ///
        /// # Safety
        ///
        /// `fd` must be an open descriptor owned by nobody else; the device
        /// closes it on drop.
        pub unsafe fn from_raw_fd(fd: RawFd, poll_interval: Duration) -> Self {
            // SAFETY: ownership of `fd` is transferred by the caller.
            let file = unsafe { File::from_raw_fd(fd) };
            Self::from_file(file, poll_interval)
        }

        pub fn from_file(file: File, poll_interval: Duration) -> Self {
            let poll_timeout_ms = poll_interval.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;
            Self {
                file,
                poll_timeout_ms,
            }
        }

        fn wait_readable(&self) -> io::Result<()> {
            let mut pfd = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: `pfd` is a valid pollfd and we pass a count of one.
            let ready = unsafe { libc::poll(&mut pfd, 1, self.poll_timeout_ms) };
            if ready < 0 {
                return Err(io::Error::last_os_error());
            }
            if ready == 0 {
                return Err(io::ErrorKind::TimedOut.into());
            }
            if pfd.revents & libc::POLLIN == 0 {
                // Hang-up or error without data: the interface is gone
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            Ok(())
        }
    }

    impl TunDevice for FdDevice {
        fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.wait_readable()?;
            self.file.read(buf)
        }

        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            self.file.write_all(frame)
        }
    }
}
