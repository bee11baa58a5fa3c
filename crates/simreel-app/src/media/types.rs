use std::time::{Duration, Instant};

/// Frame delay used when the container specifies zero.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// How a frame's region should be treated before the next frame draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalHint {
    /// No disposal specified.
    #[default]
    Unspecified,
    /// Leave the frame in place.
    Keep,
    /// Clear the frame region to the background.
    Background,
    /// Restore the region to what it was before the frame was drawn.
    Previous,
}

impl DisposalHint {
    /// Whether compositing honours this hint exactly. Everything else is
    /// treated as `Keep`.
    pub fn is_supported(self) -> bool {
        matches!(self, DisposalHint::Unspecified | DisposalHint::Keep)
    }
}

impl From<gif::DisposalMethod> for DisposalHint {
    fn from(method: gif::DisposalMethod) -> Self {
        match method {
            gif::DisposalMethod::Any => DisposalHint::Unspecified,
            gif::DisposalMethod::Keep => DisposalHint::Keep,
            gif::DisposalMethod::Background => DisposalHint::Background,
            gif::DisposalMethod::Previous => DisposalHint::Previous,
        }
    }
}

/// One uncomposited frame patch extracted from the container.
#[derive(Debug, Clone)]
pub struct RawFrameChunk {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// RGBA8, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
    /// Display duration in milliseconds; 0 means "not specified".
    pub delay_ms: u32,
    pub disposal: DisposalHint,
}

/// A full-canvas frame ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
    pub delay_ms: u32,
}

impl CompositedFrame {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_ms))
    }

    /// RGBA value at (x, y), or `None` outside the canvas.
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Mutable playback position, owned by the player.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub current_frame: usize,
    pub playing: bool,
    /// Timestamp of the last frame advance (or baseline tick).
    pub last_tick: Option<Instant>,
}

impl PlaybackState {
    pub fn new(playing: bool) -> Self {
        Self {
            current_frame: 0,
            playing,
            last_tick: None,
        }
    }

    /// Forget the tick baseline; the next tick only re-establishes it.
    pub fn reset_timing(&mut self) {
        self.last_tick = None;
    }
}

/// Load status reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Nothing loaded yet.
    Idle,
    /// Decode in progress.
    Loading,
    /// Frames available.
    Ready,
    /// Well-formed container with zero frames.
    Empty,
    /// Decode failed; the raw payload is still downloadable.
    Unavailable { reason: String },
}

impl PlayerStatus {
    pub fn label(&self) -> &str {
        match self {
            PlayerStatus::Idle => "No animation",
            PlayerStatus::Loading => "Loading animation frames...",
            PlayerStatus::Ready => "Ready",
            PlayerStatus::Empty => "No frames available",
            PlayerStatus::Unavailable { .. } => "Animation unavailable",
        }
    }
}

/// Read-only snapshot for presentation (avoids holding a borrow on the player).
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub status: PlayerStatus,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub current_frame: usize,
    pub frame_count: usize,
    pub frame_label: String,
    pub time_label: String,
    pub total_time_label: String,
    /// Seek-bar position in [0, 1].
    pub progress: f64,
    pub playing: bool,
    pub downloadable: bool,
}
