use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, Zs2Error};
use crate::scanner::resync::find_next_name;

/// File marker at offset 0 of every decompressed stream.
pub const FILE_MARKER: u32 = 0xDEAD_BEAF;
pub const FILE_MARKER_BYTES: [u8; 4] = [0xAF, 0xBE, 0xAD, 0xDE];
/// First chunk starts right after the marker.
pub const HEADER_SIZE: usize = 4;

pub fn has_file_marker(stream: &[u8]) -> bool {
    stream.starts_with(&FILE_MARKER_BYTES)
}

/// True if the first chunk does not start right after the file marker.
pub fn has_extended_header(stream: &[u8]) -> bool {
    find_next_name(stream, 0) > HEADER_SIZE
}

/// Validate the stream header before scanning.  Debug mode only insists on
/// the minimum length.
pub fn check(stream: &[u8], debug: bool) -> Result<()> {
    if stream.len() < HEADER_SIZE {
        return Err(Zs2Error::truncated(0, HEADER_SIZE, stream.len()));
    }
    if debug {
        return Ok(());
    }
    if !has_file_marker(stream) {
        return Err(Zs2Error::BadMagic { found: LittleEndian::read_u32(&stream[..HEADER_SIZE]) });
    }
    if has_extended_header(stream) {
        return Err(Zs2Error::ExtendedHeader { offset: find_next_name(stream, 0) });
    }
    Ok(())
}

/// Hex BLAKE3 digest of a decompressed stream, used to compare conversion
/// cycles.
pub fn fingerprint(stream: &[u8]) -> String {
    blake3::hash(stream).to_hex().to_string()
}
