// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::Path;

/// Magic bytes at the start of the file header and the end of the file footer
pub const MAGIC_BYTES: [u8; 4] = [b'S', b'P', b'E', b'V'];

/// File extension of hourly files
pub const FILE_EXTENSION: &str = "bin";

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(_path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}
