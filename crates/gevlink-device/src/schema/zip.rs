//! Minimal ZIP reader for zipped GenICam schemas.
//!
//! Devices that compress their schema wrap a single XML file in a plain ZIP
//! archive (stored or deflate, no zip64, no encryption). This reader
//! extracts the first entry of such an archive and verifies its CRC; it is
//! not a general purpose ZIP implementation.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;

const EOCD_SIZE: usize = 22;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Decompresses the first file of a ZIP archive.
pub fn first_file(data: &[u8]) -> io::Result<Vec<u8>> {
    let eocd_offset = find_eocd(data)?;
    let mut cursor = Cursor::new(&data[eocd_offset..]);
    let _signature = cursor.read_u32::<LittleEndian>()?;
    let _disk_number = cursor.read_u16::<LittleEndian>()?;
    let _central_dir_disk = cursor.read_u16::<LittleEndian>()?;
    let _entries_on_disk = cursor.read_u16::<LittleEndian>()?;
    let total_entries = cursor.read_u16::<LittleEndian>()?;
    let _central_dir_size = cursor.read_u32::<LittleEndian>()?;
    let central_dir_offset = cursor.read_u32::<LittleEndian>()? as usize;

    if total_entries == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zip archive has no entries"));
    }
    if central_dir_offset + 46 > data.len() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "central directory out of range"));
    }

    // Central directory record of the first entry.
    let mut cursor = Cursor::new(&data[central_dir_offset..]);
    if cursor.read_u32::<LittleEndian>()? != CENTRAL_HEADER_SIGNATURE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad central directory signature"));
    }
    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let _mod_time = cursor.read_u16::<LittleEndian>()?;
    let _mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as usize;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as usize;
    let _name_len = cursor.read_u16::<LittleEndian>()?;
    let _extra_len = cursor.read_u16::<LittleEndian>()?;
    let _comment_len = cursor.read_u16::<LittleEndian>()?;
    let _start_disk = cursor.read_u16::<LittleEndian>()?;
    let _internal_attributes = cursor.read_u16::<LittleEndian>()?;
    let _external_attributes = cursor.read_u32::<LittleEndian>()?;
    let local_header_offset = cursor.read_u32::<LittleEndian>()? as usize;

    // Local header; name and extra lengths here may differ from the central
    // directory copy, so re-read them.
    if local_header_offset + 30 > data.len() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "local header out of range"));
    }
    let mut cursor = Cursor::new(&data[local_header_offset..]);
    if cursor.read_u32::<LittleEndian>()? != LOCAL_HEADER_SIGNATURE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad local header signature"));
    }
    let mut skip = [0u8; 22];
    cursor.read_exact(&mut skip)?;
    let name_len = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

    let data_offset = local_header_offset + 30 + name_len + extra_len;
    if data_offset + compressed_size > data.len() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "entry data out of range"));
    }
    let compressed = &data[data_offset..data_offset + compressed_size];

    let decompressed = match method {
        METHOD_STORED => compressed.to_vec(),
        METHOD_DEFLATE => {
            let mut decoder = DeflateDecoder::new(compressed);
            let mut decompressed = Vec::with_capacity(uncompressed_size);
            decoder.read_to_end(&mut decompressed)?;
            decompressed
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported zip compression method {other}"),
            ));
        }
    };

    if decompressed.len() != uncompressed_size {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zip entry size mismatch"));
    }
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&decompressed);
    if hasher.finalize() != crc32 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zip entry crc mismatch"));
    }

    Ok(decompressed)
}

/// Locates the end-of-central-directory record, scanning backwards over a
/// possible archive comment.
fn find_eocd(data: &[u8]) -> io::Result<usize> {
    if data.len() < EOCD_SIZE {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "archive too small"));
    }
    let mut offset = data.len() - EOCD_SIZE;
    loop {
        if u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) == EOCD_SIGNATURE
        {
            return Ok(offset);
        }
        if offset == 0 || data.len() - offset >= EOCD_SIZE + u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "end of central directory not found",
            ));
        }
        offset -= 1;
    }
}
