//! SPIR-V binary loading
//!
//! Every failure (missing file, size not a multiple of 4, bad magic number)
//! is an `Error::ShaderLoad`, raised at pipeline build time.

use std::path::Path;
use crate::engine_err;
use crate::error::Result;

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read and validate a SPIR-V file
///
/// # Errors
///
/// `Error::ShaderLoad` if the file cannot be read or is not SPIR-V.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        engine_err!("rosy::shader", ShaderLoad => "Failed to read shader '{}': {}", path.display(), e)
    })?;
    parse_spirv(&bytes).map_err(|e| {
        engine_err!("rosy::shader", ShaderLoad => "Invalid shader '{}': {}", path.display(), e)
    })
}

/// Convert raw bytes into SPIR-V words, fixing endianness from the magic number
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(crate::rosy::Error::ShaderLoad(format!(
            "size {} is not a non-zero multiple of 4",
            bytes.len()
        )));
    }

    let mut words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] == SPIRV_MAGIC.swap_bytes() {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    }
    if words[0] != SPIRV_MAGIC {
        return Err(crate::rosy::Error::ShaderLoad(format!(
            "bad magic number {:#010x}",
            words[0]
        )));
    }
    Ok(words)
}
