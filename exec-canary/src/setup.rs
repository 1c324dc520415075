use std::path::Path;

use anyhow::Context;
use aya::programs::TracePoint;
use aya::Ebpf;
use aya_log::EbpfLogger;
use log::{debug, info, warn};

use exec_canary_common::{PROGRAM_NAME, TRACEPOINT_CATEGORY, TRACEPOINT_NAME};

pub fn check_permission() -> Result<(), anyhow::Error> {
    if unsafe { libc::geteuid() } != 0 {
        anyhow::bail!("currently only supports running as the root user.");
    }
    Ok(())
}

/// Lifts the locked memory limit for kernels without memcg based
/// accounting of bpf maps.
pub fn raise_memlock_limit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {}", ret);
    }
}

/// Loads the eBPF object and attaches its execve tracepoint. Dropping the
/// returned handle detaches it again.
pub fn load_program(object: &Path) -> Result<Ebpf, anyhow::Error> {
    let mut bpf = Ebpf::load_file(object)
        .with_context(|| format!("loading eBPF object {}", object.display()))?;
    if let Err(e) = EbpfLogger::init(&mut bpf) {
        // This can happen if you remove all log statements from your eBPF program.
        warn!("failed to initialize eBPF logger: {}", e);
    }
    let program: &mut TracePoint = bpf
        .program_mut(PROGRAM_NAME)
        .with_context(|| format!("missing program {}", PROGRAM_NAME))?
        .try_into()?;
    program.load().context("loading tracepoint program")?;
    program
        .attach(TRACEPOINT_CATEGORY, TRACEPOINT_NAME)
        .with_context(|| format!("attaching to {}/{}", TRACEPOINT_CATEGORY, TRACEPOINT_NAME))?;
    info!("attached {} to {}/{}", PROGRAM_NAME, TRACEPOINT_CATEGORY, TRACEPOINT_NAME);
    Ok(bpf)
}
