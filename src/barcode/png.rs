//! Raster rendering of card codes.
//!
//! The PNG byte stream is built by hand: signature, IHDR/IDAT/IEND chunk
//! framing and the scanline layout live here, only the zlib deflate and
//! CRC32 primitives come from crates. Output is an 8 bit truecolor image
//! with pure black bars on white.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{encode, PATTERN_LEN};
use crate::error::ServiceResult;

/// Geometry of a rendered raster symbol.
///
/// The symbol is `module_px` pixels per module with `quiet_modules` blank
/// modules on both sides; bars span `bar_height_px` rows starting below a
/// white margin of `top_margin_px` rows, mirrored at the bottom.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PngOptions {
    pub module_px: u32,
    pub quiet_modules: u32,
    pub bar_height_px: u32,
    pub top_margin_px: u32,
}

impl Default for PngOptions {
    fn default() -> Self {
        PngOptions {
            module_px: 4,
            quiet_modules: 12,
            bar_height_px: 180,
            top_margin_px: 12,
        }
    }
}

impl PngOptions {
    /// A zero module width degenerates to one pixel per module.
    fn module(&self) -> u32 {
        self.module_px.max(1)
    }

    pub fn width(&self) -> u32 {
        (PATTERN_LEN as u32 + 2 * self.quiet_modules) * self.module()
    }

    pub fn height(&self) -> u32 {
        self.bar_height_px + 2 * self.top_margin_px
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(payload);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Render a card code as a PNG image.
///
/// The code is validated before a single byte is produced; on failure the
/// error propagates and no partial image exists.
pub fn render_png(code: &str, options: &PngOptions) -> ServiceResult<Vec<u8>> {
    let pattern = encode(code)?;

    let module = options.module();
    let quiet = options.quiet_modules;
    let width = options.width();
    let height = options.height();
    let bar_top = options.top_margin_px;
    let bar_bottom = options.top_margin_px + options.bar_height_px;

    // Raw scanlines, each prefixed with filter type 0 (none).
    let mut raw = Vec::with_capacity((height * (width * 3 + 1)) as usize);
    for y in 0..height {
        raw.push(0);
        let in_bar_band = y >= bar_top && y < bar_bottom;
        for x in 0..width {
            let module_index = i64::from(x / module) - i64::from(quiet);
            let black = in_bar_band
                && (0..PATTERN_LEN as i64).contains(&module_index)
                && pattern.bit(module_index as usize);
            let value = if black { 0x00 } else { 0xff };
            raw.extend_from_slice(&[value, value, value]);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    // IHDR: dimensions, bit depth 8, truecolor, deflate, filter method 0,
    // no interlace.
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &compressed);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;

    use super::*;
    use crate::error::ServiceError;

    struct Chunk {
        kind: [u8; 4],
        payload: Vec<u8>,
    }

    /// Minimal PNG reader: checks the signature, verifies every chunk CRC
    /// and returns the chunk list.
    fn read_chunks(bytes: &[u8]) -> Vec<Chunk> {
        assert_eq!(&bytes[..8], &PNG_SIGNATURE[..]);

        let mut chunks = Vec::new();
        let mut offset = 8;
        while offset < bytes.len() {
            let length =
                u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
            let kind: [u8; 4] = bytes[offset + 4..offset + 8].try_into().unwrap();
            let payload = bytes[offset + 8..offset + 8 + length].to_vec();
            let crc = u32::from_be_bytes(
                bytes[offset + 8 + length..offset + 12 + length]
                    .try_into()
                    .unwrap(),
            );

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&kind);
            hasher.update(&payload);
            assert_eq!(hasher.finalize(), crc, "chunk {kind:?} has a bad crc");

            chunks.push(Chunk { kind, payload });
            offset += 12 + length;
        }
        chunks
    }

    #[test]
    fn stream_is_a_wellformed_png() {
        let options = PngOptions::default();
        let bytes = render_png("4006381333931", &options).unwrap();
        let chunks = read_chunks(&bytes);

        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[0].kind, b"IHDR");
        assert_eq!(&chunks[1].kind, b"IDAT");
        assert_eq!(&chunks[2].kind, b"IEND");
        assert!(chunks[2].payload.is_empty());

        let ihdr = &chunks[0].payload;
        assert_eq!(ihdr.len(), 13);
        assert_eq!(
            u32::from_be_bytes(ihdr[0..4].try_into().unwrap()),
            options.width()
        );
        assert_eq!(
            u32::from_be_bytes(ihdr[4..8].try_into().unwrap()),
            options.height()
        );
        // bit depth 8, color type 2, compression 0, filter 0, interlace 0
        assert_eq!(&ihdr[8..13], &[8u8, 2, 0, 0, 0][..]);
    }

    #[test]
    fn decoded_pixels_match_the_bit_pattern() {
        let options = PngOptions {
            module_px: 2,
            quiet_modules: 3,
            bar_height_px: 4,
            top_margin_px: 1,
        };
        let code = "4006381333931";
        let bytes = render_png(code, &options).unwrap();
        let chunks = read_chunks(&bytes);

        let mut raw = Vec::new();
        ZlibDecoder::new(chunks[1].payload.as_slice())
            .read_to_end(&mut raw)
            .unwrap();

        let width = options.width() as usize;
        let height = options.height() as usize;
        assert_eq!(raw.len(), height * (1 + width * 3));

        let pattern = encode(code).unwrap();
        for y in 0..height {
            let line = &raw[y * (1 + width * 3)..(y + 1) * (1 + width * 3)];
            assert_eq!(line[0], 0, "scanline filter type must be none");

            for x in 0..width {
                let pixel = &line[1 + x * 3..4 + x * 3];
                let module_index = (x / 2) as i64 - 3;
                let in_bar_band = y >= 1 && y < 5;
                let black = in_bar_band
                    && (0..PATTERN_LEN as i64).contains(&module_index)
                    && pattern.bit(module_index as usize);
                let expected = if black { [0u8, 0, 0] } else { [255u8, 255, 255] };
                assert_eq!(pixel, &expected[..], "pixel mismatch at ({x}, {y})");
            }
        }
    }

    #[test]
    fn invalid_code_produces_no_bytes() {
        let result = render_png("4006381333932", &PngOptions::default());
        assert!(matches!(result, Err(ServiceError::InvalidCode(_))));
    }

    #[test]
    fn quiet_zone_and_margins_are_white() {
        let options = PngOptions {
            module_px: 1,
            quiet_modules: 2,
            bar_height_px: 2,
            top_margin_px: 1,
        };
        let bytes = render_png("4006381333931", &options).unwrap();
        let chunks = read_chunks(&bytes);

        let mut raw = Vec::new();
        ZlibDecoder::new(chunks[1].payload.as_slice())
            .read_to_end(&mut raw)
            .unwrap();

        let width = options.width() as usize;
        let stride = 1 + width * 3;

        // Top margin row and bottom margin row are fully white.
        for y in [0usize, 3] {
            assert!(raw[y * stride + 1..(y + 1) * stride].iter().all(|&b| b == 255));
        }
        // Quiet zones of a bar row are white, the start guard is not.
        let bar_row = &raw[stride + 1..2 * stride];
        assert!(bar_row[..2 * 3].iter().all(|&b| b == 255));
        assert!(bar_row[width * 3 - 2 * 3..].iter().all(|&b| b == 255));
        assert_eq!(&bar_row[2 * 3..3 * 3], &[0u8, 0, 0][..]);
    }
}
