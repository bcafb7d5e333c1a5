//! gzip framing of `.zs2` files.
//!
//! Files written here match the framing of the instrument software: level 6
//! deflate, zero modification time, no file name, XFL byte `0x00` and OS byte
//! `0x0B`.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::{Compression, GzBuilder};
use log::debug;

use crate::error::Result;
use crate::stream;

pub const COMPRESSION_LEVEL: u32 = 6;
/// Offset of the XFL byte in the gzip header.
const XFL_OFFSET: usize = 8;
const XFL: u8 = 0x00;
/// Offset of the OS byte in the gzip header.
const OS_OFFSET: usize = 9;
const OS_NTFS: u8 = 0x0B;

/// Decompress a container and validate the stream header.
pub fn decompress(container: &[u8], debug: bool) -> Result<Vec<u8>> {
    let mut stream = Vec::new();
    MultiGzDecoder::new(container).read_to_end(&mut stream)?;
    debug!("decompressed {} bytes into {}", container.len(), stream.len());
    stream::check(&stream, debug)?;
    Ok(stream)
}

pub fn read_stream(path: impl AsRef<Path>, debug: bool) -> Result<Vec<u8>> {
    decompress(&fs::read(path)?, debug)
}

pub fn compress(stream: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(OS_NTFS)
        .write(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(stream)?;
    let mut container = encoder.finish()?;
    container[XFL_OFFSET] = XFL;
    container[OS_OFFSET] = OS_NTFS;
    Ok(container)
}

pub fn write_stream(path: impl AsRef<Path>, stream: &[u8]) -> Result<()> {
    fs::write(path, compress(stream)?)?;
    Ok(())
}
