use thiserror::Error;

use super::types::{CompositedFrame, DEFAULT_FRAME_DELAY_MS, RawFrameChunk};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed GIF container: {0}")]
    Container(#[from] gif::DecodingError),
    #[error("logical screen has zero size ({width}x{height})")]
    ZeroCanvas { width: u32, height: u32 },
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Delay substituted for frames that specify zero.
    pub default_delay_ms: u32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            default_delay_ms: DEFAULT_FRAME_DELAY_MS,
        }
    }
}

/// Fully composited animation: every frame covers the logical screen.
#[derive(Debug, Clone)]
pub struct DecodedAnimation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<CompositedFrame>,
    /// Frames whose disposal hint was composited as "leave as-is".
    pub unsupported_disposals: usize,
}

impl DecodedAnimation {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decode a GIF byte buffer with default options.
pub fn decode(bytes: &[u8]) -> Result<DecodedAnimation, DecodeError> {
    decode_with(bytes, &DecodeOptions::default())
}

pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<DecodedAnimation, DecodeError> {
    let (width, height, chunks) = read_chunks(bytes)?;
    let unsupported_disposals = chunks.iter().filter(|c| !c.disposal.is_supported()).count();
    let frames = composite(width, height, &chunks, options.default_delay_ms);

    if unsupported_disposals > 0 {
        log::warn!(
            "GIF uses restore-to-background/previous disposal on {} frame{}; composited as leave-as-is",
            unsupported_disposals,
            if unsupported_disposals == 1 { "" } else { "s" }
        );
    }
    log::info!("Decoded GIF: {}x{}, {} frames", width, height, frames.len());

    Ok(DecodedAnimation {
        width,
        height,
        frames,
        unsupported_disposals,
    })
}

/// Parse the logical screen and extract every frame patch as RGBA.
pub fn read_chunks(bytes: &[u8]) -> Result<(u32, u32, Vec<RawFrameChunk>), DecodeError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut reader = match options.read_info(bytes) {
        Ok(reader) => reader,
        Err(e) => {
            // The gif crate wants at least one block before the trailer
            return match bare_screen(bytes) {
                Some((0, height)) => Err(DecodeError::ZeroCanvas { width: 0, height }),
                Some((width, 0)) => Err(DecodeError::ZeroCanvas { width, height: 0 }),
                Some((width, height)) => Ok((width, height, Vec::new())),
                None => Err(e.into()),
            };
        }
    };

    let width = u32::from(reader.width());
    let height = u32::from(reader.height());
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroCanvas { width, height });
    }

    let mut chunks = Vec::new();
    while let Some(frame) = reader.read_next_frame()? {
        chunks.push(RawFrameChunk {
            left: u32::from(frame.left),
            top: u32::from(frame.top),
            width: u32::from(frame.width),
            height: u32::from(frame.height),
            pixels: frame.buffer.to_vec(),
            // GIF delay is in centiseconds
            delay_ms: u32::from(frame.delay) * 10,
            disposal: frame.dispose.into(),
        });
    }

    Ok((width, height, chunks))
}

/// Logical screen size of a container holding only the header, the optional
/// global color table and the trailer.
fn bare_screen(bytes: &[u8]) -> Option<(u32, u32)> {
    const HEADER_LEN: usize = 13;
    let signature_ok = bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a");
    if bytes.len() < HEADER_LEN || !signature_ok {
        return None;
    }
    let width = u32::from(u16::from_le_bytes([bytes[6], bytes[7]]));
    let height = u32::from(u16::from_le_bytes([bytes[8], bytes[9]]));
    let flags = bytes[10];
    let table_len = if flags & 0x80 != 0 {
        3 * (1usize << ((flags & 0x07) + 1))
    } else {
        0
    };
    match bytes.get(HEADER_LEN + table_len) {
        Some(0x3B) => Some((width, height)),
        _ => None,
    }
}

/// Composite chunks onto a running canvas, snapshotting one frame per chunk.
///
/// The canvas starts fully transparent. Each chunk is overlaid on the
/// previous canvas; transparent patch pixels leave the canvas untouched.
pub fn composite(
    width: u32,
    height: u32,
    chunks: &[RawFrameChunk],
    default_delay_ms: u32,
) -> Vec<CompositedFrame> {
    let mut canvas = vec![0u8; width as usize * height as usize * 4];
    let mut frames = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        overlay(&mut canvas, width, height, chunk);
        frames.push(CompositedFrame {
            data: canvas.clone(),
            width,
            height,
            delay_ms: if chunk.delay_ms == 0 {
                default_delay_ms
            } else {
                chunk.delay_ms
            },
        });
    }

    frames
}

fn overlay(canvas: &mut [u8], width: u32, height: u32, chunk: &RawFrameChunk) {
    // Clip the patch to the canvas
    let x_end = chunk.left.saturating_add(chunk.width).min(width);
    let y_end = chunk.top.saturating_add(chunk.height).min(height);
    if chunk.left >= x_end || chunk.top >= y_end {
        return;
    }
    let visible_w = (x_end - chunk.left) as usize;

    for y in chunk.top..y_end {
        let src_row = ((y - chunk.top) as usize) * chunk.width as usize * 4;
        let dst_row = (y as usize * width as usize + chunk.left as usize) * 4;
        let Some(src) = chunk.pixels.get(src_row..src_row + visible_w * 4) else {
            return;
        };
        let dst = &mut canvas[dst_row..dst_row + visible_w * 4];
        for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
            if s[3] > 0 {
                d.copy_from_slice(s);
            }
        }
    }
}
