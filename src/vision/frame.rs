//! In-memory RGB frames.
//!
//! Cameras deliver binary PPM; vision backends want PNG. Both encodings
//! are small enough to handle here without an image crate.

use crate::error::{KioskError, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Average color of a set of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && (x - self.x) < self.width
            && (y - self.y) < self.height
    }
}

/// 8-bit RGB image, row-major, three bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(KioskError::capture(format!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame filled with one color.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Self {
        let pixels = [color.r, color.g, color.b].repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Rgb::new(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2])
    }

    /// Paint `region` (clipped to the frame) with `color`.
    pub fn fill(&mut self, region: Region, color: Rgb) {
        let x_end = region.x.saturating_add(region.width).min(self.width);
        let y_end = region.y.saturating_add(region.height).min(self.height);
        for y in region.y.min(y_end)..y_end {
            for x in region.x.min(x_end)..x_end {
                let i = (y as usize * self.width as usize + x as usize) * 3;
                self.pixels[i..i + 3].copy_from_slice(&[color.r, color.g, color.b]);
            }
        }
    }

    /// Decode a binary PPM (P6) image with a max value of at most 255.
    pub fn from_ppm(data: &[u8]) -> Result<Self> {
        let header = PpmHeader::parse(data)?;
        let raster = data
            .get(header.raster_start..header.raster_start + header.raster_len())
            .ok_or_else(|| KioskError::capture("truncated PPM raster"))?;
        let pixels = if header.max_value == 255 {
            raster.to_vec()
        } else {
            raster
                .iter()
                .map(|&v| ((v as u32 * 255) / header.max_value).min(255) as u8)
                .collect()
        };
        Self::new(header.width, header.height, pixels)
    }

    /// Read the next binary PPM from a stream of concatenated images, as
    /// `ffmpeg -f image2pipe -vcodec ppm` writes them.
    ///
    /// # Errors
    /// `CaptureFailure` on a malformed header or when the stream ends.
    pub fn read_ppm<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut data = read_ppm_header(reader)?;
        let header = PpmHeader::parse(&data)?;
        let len = header.raster_len();
        if len > MAX_RASTER_BYTES {
            return Err(KioskError::capture(format!(
                "PPM frame too large ({}x{})",
                header.width, header.height
            )));
        }
        data.resize(header.raster_start + len, 0);
        reader
            .read_exact(&mut data[header.raster_start..])
            .map_err(stream_error)?;
        Self::from_ppm(&data)
    }

    /// Encode as binary PPM (P6).
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.pixels);
        out
    }

    /// Encode as an 8-bit truecolor PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let row_len = self.width as usize * 3;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for row in self.pixels.chunks_exact(row_len) {
            // Filter type 0 (None) for every scanline.
            encoder.write_all(&[0])?;
            encoder.write_all(row)?;
        }
        let compressed = encoder.finish()?;

        let mut header = Vec::with_capacity(13);
        header.extend_from_slice(&self.width.to_be_bytes());
        header.extend_from_slice(&self.height.to_be_bytes());
        // bit depth 8, color type 2 (RGB), deflate, adaptive filtering, no interlace
        header.extend_from_slice(&[8, 2, 0, 0, 0]);

        let mut png = PNG_SIGNATURE.to_vec();
        write_chunk(&mut png, b"IHDR", &header);
        write_chunk(&mut png, b"IDAT", &compressed);
        write_chunk(&mut png, b"IEND", &[]);
        Ok(png)
    }

    /// Copy of `region`, clipped to the frame.
    pub fn crop(&self, region: Region) -> Result<Self> {
        let x_end = region.x.saturating_add(region.width).min(self.width);
        let y_end = region.y.saturating_add(region.height).min(self.height);
        if region.x >= x_end || region.y >= y_end {
            return Err(KioskError::capture(format!(
                "region {:?} lies outside the {}x{} frame",
                region, self.width, self.height
            )));
        }
        let mut pixels = Vec::with_capacity(((x_end - region.x) * (y_end - region.y) * 3) as usize);
        for y in region.y..y_end {
            let start = (y as usize * self.width as usize + region.x as usize) * 3;
            let end = (y as usize * self.width as usize + x_end as usize) * 3;
            pixels.extend_from_slice(&self.pixels[start..end]);
        }
        Self::new(x_end - region.x, y_end - region.y, pixels)
    }

    /// Mean color over every `step`-th pixel in both directions, skipping
    /// pixels inside `exclude`.
    ///
    /// `None` if every sampled pixel was excluded.
    pub fn average_color(&self, step: u32, exclude: Option<Region>) -> Option<Rgb> {
        let step = step.max(1) as usize;
        let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
        for y in (0..self.height).step_by(step) {
            for x in (0..self.width).step_by(step) {
                if exclude.is_some_and(|region| region.contains(x, y)) {
                    continue;
                }
                let px = self.pixel(x, y);
                r += px.r as u64;
                g += px.g as u64;
                b += px.b as u64;
                n += 1;
            }
        }
        (n > 0).then(|| Rgb::new((r / n) as u8, (g / n) as u8, (b / n) as u8))
    }
}

/// Largest raster accepted from a stream (8K RGB).
const MAX_RASTER_BYTES: usize = 7680 * 4320 * 3;

/// Longest header accepted from a stream, comments included.
const MAX_PPM_HEADER: usize = 1024;

struct PpmHeader {
    width: u32,
    height: u32,
    max_value: u32,
    raster_start: usize,
}

impl PpmHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.get(..2) != Some(&b"P6"[..]) {
            return Err(KioskError::capture("not a binary PPM image"));
        }
        let mut pos = 2;
        let mut fields = [0u32; 3];
        for field in &mut fields {
            pos = skip_whitespace_and_comments(data, pos);
            let start = pos;
            while data.get(pos).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            }
            *field = std::str::from_utf8(&data[start..pos])
                .ok()
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| KioskError::capture("malformed PPM header"))?;
        }

        let [width, height, max_value] = fields;
        if max_value == 0 || max_value > 255 {
            return Err(KioskError::capture(format!(
                "unsupported PPM max value {}",
                max_value
            )));
        }
        // Exactly one whitespace byte separates the header from the raster.
        if !data.get(pos).is_some_and(u8::is_ascii_whitespace) {
            return Err(KioskError::capture("malformed PPM header"));
        }
        Ok(Self {
            width,
            height,
            max_value,
            raster_start: pos + 1,
        })
    }

    fn raster_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Read header bytes up to and including the whitespace after the max value.
fn read_ppm_header<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    let mut tokens = 0;
    let mut in_token = false;
    let mut in_comment = false;

    while tokens < 4 {
        reader.read_exact(&mut byte).map_err(stream_error)?;
        let b = byte[0];
        header.push(b);
        if header.len() > MAX_PPM_HEADER {
            return Err(KioskError::capture("malformed PPM header"));
        }
        if in_comment {
            in_comment = b != b'\n';
        } else if b == b'#' && !in_token {
            in_comment = true;
        } else if b.is_ascii_whitespace() {
            if in_token {
                in_token = false;
                tokens += 1;
            }
        } else {
            in_token = true;
        }
    }
    Ok(header)
}

fn stream_error(e: std::io::Error) -> KioskError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        KioskError::capture("frame stream ended")
    } else {
        KioskError::capture(format!("failed to read frame: {}", e))
    }
}

fn skip_whitespace_and_comments(data: &[u8], mut pos: usize) -> usize {
    loop {
        match data.get(pos) {
            Some(c) if c.is_ascii_whitespace() => pos += 1,
            Some(b'#') => {
                while data.get(pos).is_some_and(|&c| c != b'\n') {
                    pos += 1;
                }
            }
            _ => return pos,
        }
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc = flate2::Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}
