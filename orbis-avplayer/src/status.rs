//! Guest status codes
//!
//! Values match the console library's error vocabulary. Codes are `i32`
//! the way guests see them; the error bit makes them negative.

pub const OK: i32 = 0;

pub const INVALID_PARAMS: i32 = 0x806A_0001_u32 as i32;
pub const OPERATION_FAILED: i32 = 0x806A_0002_u32 as i32;
pub const NO_MEMORY: i32 = 0x806A_0003_u32 as i32;
pub const NOT_SUPPORTED: i32 = 0x806A_0004_u32 as i32;

pub const WAR_FILE_NONINTERLEAVED: i32 = 0x806A_00A0_u32 as i32;
pub const WAR_LOOPING_BACK: i32 = 0x806A_00A1_u32 as i32;
pub const WAR_JUMP_COMPLETE: i32 = 0x806A_00A3_u32 as i32;

/// Symbolic name of a status code, for logging
pub fn name(code: i32) -> &'static str {
    match code {
        OK => "OK",
        INVALID_PARAMS => "INVALID_PARAMS",
        OPERATION_FAILED => "OPERATION_FAILED",
        NO_MEMORY => "NO_MEMORY",
        NOT_SUPPORTED => "NOT_SUPPORTED",
        WAR_FILE_NONINTERLEAVED => "WAR_FILE_NONINTERLEAVED",
        WAR_LOOPING_BACK => "WAR_LOOPING_BACK",
        WAR_JUMP_COMPLETE => "WAR_JUMP_COMPLETE",
        _ => "UNKNOWN",
    }
}
