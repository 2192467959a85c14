//! devbox host abstraction layer.
//!
//! Everything that touches the host (spawning processes, reading `/etc`,
//! searching `PATH`) goes through these traits so provisioning steps can be
//! exercised in tests without a real workstation.

pub mod hal;
pub mod os_release;
pub mod path;

pub use devbox_error::{HalError, HalResult};
pub use hal::{FakeHal, HostInfoOps, LinuxHal, Operation, OsReleaseInfo, ProcessOps, SystemHal};
