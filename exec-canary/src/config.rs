use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::encoder::{MAGIC_SEGMENT_LEN, MAX_HOSTNAME_LEN};
use crate::watch::{WatchList, WatchListError};

pub const DEFAULT_PATHS: &str = "/usr/bin/id,/usr/bin/whoami,/usr/bin/hostname";
pub const DEFAULT_BPF_OBJECT: &str = "/usr/lib/exec-canary/exec-canary-ebpf";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// DNS hostname to ping on events
    #[arg(long, env = "EXEC_CANARY_HOSTNAME")]
    pub hostname: Option<String>,
    /// CSV; match `execve` syscalls with these pathnames as a first arg
    #[arg(short, long, default_value = DEFAULT_PATHS)]
    pub paths: String,
    /// seconds to wait for a DNS answer before giving up on an alert
    #[arg(long, default_value_t = 5)]
    pub dns_timeout: u64,
    /// compiled eBPF object holding the execve tracepoint
    #[arg(long, env = "EXEC_CANARY_BPF_OBJECT", default_value = DEFAULT_BPF_OBJECT)]
    pub bpf_object: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("hostname not set but required")]
    MissingHostname,
    #[error("hostname too long: {0} ({1} chars)")]
    HostnameTooLong(String, usize),
    #[error(transparent)]
    WatchList(#[from] WatchListError),
    #[error("dns timeout must be at least one second")]
    ZeroTimeout,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub canary_hostname: String,
    pub watch_list: WatchList,
    pub dns_timeout: Duration,
    pub bpf_object: PathBuf,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let canary_hostname = args
            .hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHostname)?;
        // room for the magic label and its separator
        if canary_hostname.len() + MAGIC_SEGMENT_LEN + 1 > MAX_HOSTNAME_LEN {
            let len = canary_hostname.len();
            return Err(ConfigError::HostnameTooLong(canary_hostname, len));
        }
        if args.dns_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            canary_hostname,
            watch_list: WatchList::parse_csv(&args.paths)?,
            dns_timeout: Duration::from_secs(args.dns_timeout),
            bpf_object: args.bpf_object,
        })
    }
}
