#![no_std]

/// Size of the pathname field carried by every exec record, NUL included.
pub const MAX_PATHNAME_LEN: usize = 128;

/// Name of the perf event array the kernel program writes to.
pub const EVENTS_MAP: &str = "EVENTS";
/// Name of the tracepoint program.
pub const PROGRAM_NAME: &str = "canary_execve";
pub const TRACEPOINT_CATEGORY: &str = "syscalls";
pub const TRACEPOINT_NAME: &str = "sys_enter_execve";

/// One record per observed `execve` entry: the first argument to the call,
/// zero padded.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct ExecEvent {
    pub pathname: [u8; MAX_PATHNAME_LEN],
}

impl ExecEvent {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn zeroed() -> Self {
        Self {
            pathname: [0; MAX_PATHNAME_LEN],
        }
    }
}

impl Default for ExecEvent {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for ExecEvent {}
