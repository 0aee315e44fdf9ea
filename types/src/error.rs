// SPDX-License-Identifier: CC0-1.0

//! Error support.

/// Formats an error message along with its source.
macro_rules! write_err {
    ($writer:expr, $string:literal $(, $args:expr)*; $source:expr) => {
        write!($writer, concat!($string, ": {}") $(, $args)*, $source)
    };
}
pub(crate) use write_err;
