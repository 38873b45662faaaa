//! 16-bit linear PCM in a Core Audio Format container
//!
//! Layout: file header, `desc` chunk, `data` chunk. Header fields are
//! big-endian; samples are little-endian as flagged in `desc`. The data
//! chunk is written with an unknown size (-1) and patched on finish.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use super::AudioEncoder;
use crate::asset::SourceSpec;
use crate::audio::convert::f32_to_i16;
use crate::error::{Error, Result};

const CAF_VERSION: u16 = 1;
const DESC_CHUNK_SIZE: i64 = 32;
const LPCM_FLAG_LITTLE_ENDIAN: u32 = 1 << 1;
const BITS_PER_CHANNEL: u32 = 16;

/// Offset of the data chunk's size field: file header (8) + desc header (12)
/// + desc body (32) + data chunk type (4)
const DATA_SIZE_OFFSET: u64 = 8 + 12 + 32 + 4;

pub struct CafEncoder<W: Write + Seek = BufWriter<File>> {
    writer: W,
    data_bytes: u64,
}

impl CafEncoder {
    pub fn create(path: &Path, spec: SourceSpec) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| Error::WriteError(format!("cannot create {}: {}", path.display(), e)))?;
        Self::new(BufWriter::new(file), spec)
    }
}

impl<W: Write + Seek> CafEncoder<W> {
    pub fn new(mut writer: W, spec: SourceSpec) -> Result<Self> {
        write_header(&mut writer, spec).map_err(write_error)?;
        Ok(Self {
            writer,
            data_bytes: 0,
        })
    }

    fn patch_data_size(&mut self) -> std::io::Result<()> {
        // chunk size covers the edit count plus the sample bytes
        let size = 4 + self.data_bytes as i64;
        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.writer.write_i64::<BigEndian>(size)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

fn write_header<W: Write>(w: &mut W, spec: SourceSpec) -> std::io::Result<()> {
    let bytes_per_frame = spec.channels as u32 * (BITS_PER_CHANNEL / 8);

    w.write_all(b"caff")?;
    w.write_u16::<BigEndian>(CAF_VERSION)?;
    w.write_u16::<BigEndian>(0)?;

    w.write_all(b"desc")?;
    w.write_i64::<BigEndian>(DESC_CHUNK_SIZE)?;
    w.write_f64::<BigEndian>(spec.sample_rate as f64)?;
    w.write_all(b"lpcm")?;
    w.write_u32::<BigEndian>(LPCM_FLAG_LITTLE_ENDIAN)?;
    w.write_u32::<BigEndian>(bytes_per_frame)?;
    w.write_u32::<BigEndian>(1)?;
    w.write_u32::<BigEndian>(spec.channels as u32)?;
    w.write_u32::<BigEndian>(BITS_PER_CHANNEL)?;

    w.write_all(b"data")?;
    w.write_i64::<BigEndian>(-1)?;
    // edit count
    w.write_u32::<BigEndian>(0)?;
    Ok(())
}

fn write_error(e: std::io::Error) -> Error {
    Error::WriteError(e.to_string())
}

impl<W: Write + Seek + Send> AudioEncoder for CafEncoder<W> {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        for &s in samples {
            self.writer
                .write_i16::<LittleEndian>(f32_to_i16(s))
                .map_err(write_error)?;
        }
        self.data_bytes += samples.len() as u64 * 2;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.patch_data_size().map_err(write_error)?;
        debug!("Finalized CAF with {} data bytes", self.data_bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::{Cursor, Read};

    #[test]
    fn test_header_and_patched_size() {
        let mut encoder =
            Box::new(CafEncoder::new(Cursor::new(Vec::new()), SourceSpec::new(44100, 2)).unwrap());
        encoder.write(&[0.5, -0.5, 0.0, 0.0]).unwrap();
        encoder.patch_data_size().unwrap();
        let bytes = encoder.into_inner().into_inner();

        let mut r = Cursor::new(&bytes);
        let mut tag = [0u8; 4];
        r.read_exact(&mut tag).unwrap();
        assert_eq!(&tag, b"caff");
        assert_eq!(r.read_u16::<BigEndian>().unwrap(), 1);

        r.set_position(20);
        assert_eq!(r.read_f64::<BigEndian>().unwrap(), 44100.0);
        r.read_exact(&mut tag).unwrap();
        assert_eq!(&tag, b"lpcm");

        r.set_position(DATA_SIZE_OFFSET);
        assert_eq!(r.read_i64::<BigEndian>().unwrap(), 4 + 8);
        assert_eq!(bytes.len() as u64, DATA_SIZE_OFFSET + 8 + 4 + 8);

        r.set_position(DATA_SIZE_OFFSET + 12);
        assert_eq!(r.read_i16::<LittleEndian>().unwrap(), 16383);
    }

    #[test]
    fn test_create_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.caf");

        let mut encoder = Box::new(CafEncoder::create(&path, SourceSpec::new(8000, 1)).unwrap());
        encoder.write(&[0.0; 100]).unwrap();
        encoder.finish().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, DATA_SIZE_OFFSET + 8 + 4 + 200);
    }
}
