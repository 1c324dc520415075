use std::ffi::CStr;
use std::str::Utf8Error;

use exec_canary_common::{ExecEvent, MAX_PATHNAME_LEN};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("short sample: {len} bytes, expected {expected}")]
    Short { len: usize, expected: usize },
    #[error("pathname is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),
}

/// Copies a raw perf sample into an [`ExecEvent`]. Bytes past the record
/// size are ignored.
pub fn parse_event(sample: &[u8]) -> Result<ExecEvent, DecodeError> {
    let field = sample
        .get(..MAX_PATHNAME_LEN)
        .ok_or(DecodeError::Short {
            len: sample.len(),
            expected: ExecEvent::SIZE,
        })?;
    let mut event = ExecEvent::zeroed();
    event.pathname.copy_from_slice(field);
    Ok(event)
}

/// The pathname up to the first NUL. A field without a terminator is used
/// whole.
pub fn pathname(event: &ExecEvent) -> Result<String, DecodeError> {
    let bytes = match CStr::from_bytes_until_nul(&event.pathname) {
        Ok(s) => s.to_bytes(),
        Err(_) => trim_trailing_zeros(&event.pathname),
    };
    Ok(std::str::from_utf8(bytes)?.to_owned())
}

pub fn decode_pathname(sample: &[u8]) -> Result<String, DecodeError> {
    pathname(&parse_event(sample)?)
}

fn trim_trailing_zeros(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
pub(crate) fn sample(path: &str) -> Vec<u8> {
    let mut buf = vec![0u8; ExecEvent::SIZE];
    buf[..path.len()].copy_from_slice(path.as_bytes());
    buf
}
