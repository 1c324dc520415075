#![no_std]
#![no_main]
use aya_ebpf::macros::{map, tracepoint};
use aya_ebpf::maps::{PerCpuArray, PerfEventArray};
use aya_ebpf::memset;
use aya_ebpf::programs::TracePointContext;
use aya_log_ebpf::debug;

use exec_canary_common::ExecEvent;

mod tools;

//sys/kernel/tracing/events/syscalls/sys_enter_execve/format
//8 bytes of common fields, then __syscall_nr padded to 8
const FILENAME_OFFSET: usize = 16;

#[map]
static EVENTS: PerfEventArray<ExecEvent> = PerfEventArray::new(0);
#[map]
static EVENT_BUFFER: PerCpuArray<ExecEvent> = PerCpuArray::with_max_entries(1, 0);

#[tracepoint]
pub fn canary_execve(ctx: TracePointContext) -> u32 {
    match try_canary_execve(&ctx) {
        Ok(ret) => ret,
        Err(_) => 0,
    }
}

fn try_canary_execve(ctx: &TracePointContext) -> Result<u32, i64> {
    let filename: *const u8 = unsafe { ctx.read_at(FILENAME_OFFSET)? };
    if filename.is_null() {
        return Ok(0);
    }
    let event = array_get_mut!(EVENT_BUFFER, 0);
    unsafe {
        memset(event as *mut ExecEvent as *mut u8, 0, ExecEvent::SIZE);
    }
    let len = read_user_str!(filename, event.pathname.as_mut_slice()).len();
    EVENTS.output(ctx, event, 0);
    debug!(ctx, "execve pathname captured, {} bytes", len);
    Ok(0)
}

#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
