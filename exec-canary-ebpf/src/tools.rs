pub const ERROR_FAULT: i64 = -1;

#[macro_export]
macro_rules! array_get_mut {
    ($name: expr, $index: expr) => {
        unsafe { &mut *($name.get_ptr_mut($index).ok_or($crate::tools::ERROR_FAULT)?) }
    };
}

/// Copies a NUL terminated user space string into `$dest`, yielding the
/// bytes read without the terminator.
#[macro_export]
macro_rules! read_user_str {
    ($src: expr, $dest: expr) => {{
        unsafe {
            aya_ebpf::helpers::bpf_probe_read_user_str_bytes($src, $dest)
                .map_err(|_| $crate::tools::ERROR_FAULT)?
        }
    }};
}
