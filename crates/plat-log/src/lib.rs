#![allow(clippy::new_without_default)]

pub mod crypto;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod time;

/// Size, in bytes, of the opaque client-facing tokens (device, profile, session) used
/// throughout the wire protocol. All three token kinds share this size.
pub const TOKEN_SIZE: usize = 16;

#[macro_export]
macro_rules! choose {
    ($cond: expr => $true_val: expr, $false_val: expr) => {{
        if $cond {
            $true_val
        } else {
            $false_val
        }
    }};
}
