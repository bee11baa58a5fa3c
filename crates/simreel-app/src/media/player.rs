use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use super::decoder::{self, DecodeOptions, DecodedAnimation};
use super::loader::AnimationLoader;
use super::render_loop::RenderLoop;
use super::timecode;
use super::types::{CompositedFrame, PlaybackState, PlayerInfo, PlayerStatus};
use crate::payload::EncodedAnimation;

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Start playing as soon as frames are available.
    pub autoplay: bool,
    /// Render loop tick interval.
    pub tick_interval: Duration,
    pub decode: DecodeOptions,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            tick_interval: RenderLoop::interval_for_rate(60),
            decode: DecodeOptions::default(),
        }
    }
}

/// Plays a decoded animation and maps its frames onto a simulated time axis.
///
/// All state lives on one thread. The render loop (when running) only
/// produces timestamps; the host feeds them back through [`Player::tick`].
pub struct Player {
    config: PlayerConfig,
    animation: Option<EncodedAnimation>,
    frames: Vec<CompositedFrame>,
    canvas: (u32, u32),
    total_simulated_secs: f64,
    state: PlaybackState,
    status: PlayerStatus,
    visible: bool,
    unsupported_disposals: usize,
    render_loop: Option<RenderLoop>,
    loader: Option<AnimationLoader>,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            animation: None,
            frames: Vec::new(),
            canvas: (0, 0),
            total_simulated_secs: 0.0,
            state: PlaybackState::new(false),
            status: PlayerStatus::Idle,
            visible: true,
            unsupported_disposals: 0,
            render_loop: None,
            loader: None,
        }
    }

    /// Replace the current animation with a synchronous decode of `animation`.
    ///
    /// `total_simulated_secs` is the length of the simulated process the
    /// animation depicts; it only affects time labels.
    pub fn load(&mut self, animation: EncodedAnimation, total_simulated_secs: f64) {
        self.begin_load(animation.clone(), total_simulated_secs);
        // A pending background decode must not land on top of this one
        if let Some(loader) = self.loader.as_mut() {
            loader.cancel();
        }
        let decoded = decoder::decode_with(animation.bytes(), &self.config.decode);
        self.finish_load(decoded);
    }

    /// Like [`Player::load`], but decodes on the background loader. Call
    /// [`Player::poll_load`] to pick up the result. Newer loads supersede
    /// older pending ones.
    pub fn load_async(&mut self, animation: EncodedAnimation, total_simulated_secs: f64) {
        if self.loader.is_none() {
            match AnimationLoader::new() {
                Ok(loader) => self.loader = Some(loader),
                Err(e) => {
                    log::warn!("Background decoder unavailable ({e}); decoding inline");
                    self.load(animation, total_simulated_secs);
                    return;
                }
            }
        }
        self.begin_load(animation.clone(), total_simulated_secs);
        if let Some(loader) = self.loader.as_mut() {
            loader.request(animation, self.config.decode.clone());
        }
    }

    /// Apply a finished background decode. Returns true if state changed.
    pub fn poll_load(&mut self) -> bool {
        if self.status != PlayerStatus::Loading {
            return false;
        }
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        let result = match loader.try_recv() {
            Ok(Some(result)) => result,
            Ok(None) => return false,
            Err(e) => {
                // A fresh loader is spawned on the next load_async
                self.loader = None;
                self.finish_load(Err(e));
                return true;
            }
        };
        log::debug!(
            "Background decode {} finished ({} bytes)",
            result.generation,
            result.animation.len()
        );
        self.finish_load(result.decoded);
        true
    }

    fn begin_load(&mut self, animation: EncodedAnimation, total_simulated_secs: f64) {
        self.render_loop = None;
        self.animation = Some(animation);
        self.frames.clear();
        self.canvas = (0, 0);
        self.unsupported_disposals = 0;
        self.total_simulated_secs = if total_simulated_secs.is_finite() {
            total_simulated_secs.max(0.0)
        } else {
            0.0
        };
        self.state = PlaybackState::new(self.config.autoplay);
        self.status = PlayerStatus::Loading;
    }

    fn finish_load<E: std::fmt::Display>(&mut self, decoded: Result<DecodedAnimation, E>) {
        match decoded {
            Ok(anim) => {
                log::debug!("Loaded {} frames", anim.frame_count());
                self.status = if anim.is_empty() {
                    PlayerStatus::Empty
                } else {
                    PlayerStatus::Ready
                };
                self.canvas = (anim.width, anim.height);
                self.unsupported_disposals = anim.unsupported_disposals;
                self.frames = anim.frames;
            }
            Err(e) => {
                log::warn!("Animation unavailable: {e}");
                self.state.playing = false;
                self.status = PlayerStatus::Unavailable {
                    reason: e.to_string(),
                };
            }
        }
        self.state.current_frame = 0;
        self.state.reset_timing();
        self.sync_render_loop();
    }

    // ---- transport ----

    pub fn play(&mut self) {
        if self.state.playing {
            return;
        }
        self.state.playing = true;
        self.state.reset_timing();
        self.sync_render_loop();
    }

    pub fn pause(&mut self) {
        if !self.state.playing {
            return;
        }
        self.state.playing = false;
        self.state.reset_timing();
        self.sync_render_loop();
    }

    pub fn toggle_play(&mut self) {
        if self.state.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn restart(&mut self) {
        self.state.current_frame = 0;
        self.state.playing = true;
        self.state.reset_timing();
        self.sync_render_loop();
    }

    /// Show the next frame and take over from autoplay.
    pub fn step_forward(&mut self) {
        self.pause();
        if let Some(last) = self.frames.len().checked_sub(1) {
            self.state.current_frame = (self.state.current_frame + 1).min(last);
        }
    }

    /// Show the previous frame and take over from autoplay.
    pub fn step_backward(&mut self) {
        self.pause();
        if !self.frames.is_empty() {
            self.state.current_frame = self.state.current_frame.saturating_sub(1);
        }
    }

    /// Jump to the frame at `fraction` of the sequence (clamped to [0, 1]).
    pub fn seek_to_fraction(&mut self, fraction: f64) {
        if self.frames.is_empty() {
            return;
        }
        self.state.current_frame = timecode::frame_for_fraction(fraction, self.frames.len());
        self.state.reset_timing();
    }

    pub fn seek_to_frame(&mut self, frame: usize) {
        if let Some(last) = self.frames.len().checked_sub(1) {
            self.state.current_frame = frame.min(last);
            self.state.reset_timing();
        }
    }

    /// Advance playback for a render-loop timestamp. Returns true if the
    /// visible frame changed.
    ///
    /// The first tick after any reset only records a baseline. At most one
    /// frame is advanced per tick no matter how much time has passed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.state.playing || self.frames.is_empty() {
            return false;
        }
        let Some(last) = self.state.last_tick else {
            self.state.last_tick = Some(now);
            return false;
        };
        let elapsed = now.saturating_duration_since(last);
        let current = &self.frames[self.state.current_frame];
        if elapsed < current.delay() {
            return false;
        }
        self.state.current_frame = (self.state.current_frame + 1) % self.frames.len();
        self.state.last_tick = Some(now);
        true
    }

    // ---- visibility / render loop ----

    /// Hidden players keep their position but stop the render loop.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.state.reset_timing();
        self.sync_render_loop();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn sync_render_loop(&mut self) {
        let should_run = self.state.playing
            && self.visible
            && self.status == PlayerStatus::Ready
            && !self.frames.is_empty();
        if !should_run {
            self.render_loop = None;
            return;
        }
        if self.render_loop.is_none() {
            match RenderLoop::start(self.config.tick_interval) {
                Ok(render_loop) => self.render_loop = Some(render_loop),
                Err(e) => log::error!("Failed to start render loop: {e}"),
            }
        }
    }

    pub fn is_loop_running(&self) -> bool {
        self.render_loop.is_some()
    }

    /// Tick source for the host event loop. Never fires while stopped.
    pub fn ticks(&self) -> Receiver<Instant> {
        match &self.render_loop {
            Some(render_loop) => render_loop.ticks().clone(),
            None => crossbeam_channel::never(),
        }
    }

    // ---- read-outs ----

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn current_index(&self) -> usize {
        self.state.current_frame
    }

    pub fn current_frame(&self) -> Option<&CompositedFrame> {
        self.frames.get(self.state.current_frame)
    }

    pub fn frame(&self, index: usize) -> Option<&CompositedFrame> {
        self.frames.get(index)
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    pub fn unsupported_disposals(&self) -> usize {
        self.unsupported_disposals
    }

    pub fn total_simulated_secs(&self) -> f64 {
        self.total_simulated_secs
    }

    pub fn simulated_secs(&self) -> f64 {
        timecode::simulated_time(
            self.state.current_frame,
            self.frames.len(),
            self.total_simulated_secs,
        )
    }

    /// Simulated time of the current frame, e.g. "3.25s".
    pub fn current_simulated_time(&self) -> String {
        timecode::time_label(self.simulated_secs())
    }

    pub fn total_time_label(&self) -> String {
        timecode::total_label(self.total_simulated_secs)
    }

    pub fn frame_label(&self) -> String {
        timecode::frame_label(self.state.current_frame, self.frames.len())
    }

    pub fn progress(&self) -> f64 {
        timecode::progress(self.state.current_frame, self.frames.len())
    }

    pub fn animation(&self) -> Option<&EncodedAnimation> {
        self.animation.as_ref()
    }

    /// Raw payload for save-as, available whether or not decoding succeeded.
    pub fn download_bytes(&self) -> Option<&[u8]> {
        self.animation.as_ref().map(|a| a.bytes())
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            status: self.status.clone(),
            canvas_width: self.canvas.0,
            canvas_height: self.canvas.1,
            current_frame: self.state.current_frame,
            frame_count: self.frames.len(),
            frame_label: self.frame_label(),
            time_label: self.current_simulated_time(),
            total_time_label: self.total_time_label(),
            progress: self.progress(),
            playing: self.state.playing,
            downloadable: self.animation.is_some(),
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::decoder::fixtures::{self, BLUE, Patch, RED};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn loaded(bytes: Vec<u8>, total: f64) -> Player {
        let mut player = Player::default();
        player.load(EncodedAnimation::from_bytes(bytes), total);
        player
    }

    fn five_frames() -> Vec<u8> {
        let patches: Vec<Patch> = (0..5).map(|_| Patch::full(2, RED, 100)).collect();
        fixtures::gif_bytes(2, 2, &patches)
    }

    #[test]
    fn starts_idle() {
        let player = Player::default();
        assert_eq!(player.status(), &PlayerStatus::Idle);
        assert_eq!(player.frame_count(), 0);
        assert!(player.current_frame().is_none());
        assert!(player.download_bytes().is_none());
        assert!(!player.is_loop_running());
    }

    #[test]
    fn load_resets_to_first_frame_and_autoplays() {
        let player = loaded(fixtures::three_frame_gif(), 12.0);
        assert_eq!(player.status(), &PlayerStatus::Ready);
        assert_eq!(player.frame_count(), 3);
        assert_eq!(player.current_index(), 0);
        assert!(player.is_playing());
        assert!(player.is_loop_running());
        assert_eq!(player.canvas_size(), (4, 4));
    }

    #[test]
    fn autoplay_can_be_disabled() {
        let mut player = Player::new(PlayerConfig {
            autoplay: false,
            ..PlayerConfig::default()
        });
        player.load(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 1.0);
        assert!(!player.is_playing());
        assert!(!player.is_loop_running());
    }

    #[test]
    fn tick_scenario_advances_by_frame_delay() {
        let mut player = loaded(fixtures::three_frame_gif(), 3.0);
        let t0 = Instant::now();

        assert!(!player.tick(t0)); // baseline
        assert_eq!(player.current_index(), 0);
        assert!(!player.tick(t0 + ms(60))); // 60 < 100
        assert_eq!(player.current_index(), 0);
        assert!(player.tick(t0 + ms(120))); // 120 >= 100
        assert_eq!(player.current_index(), 1);
        assert!(player.tick(t0 + ms(330))); // 210 >= 50
        assert_eq!(player.current_index(), 2);
        assert!(!player.tick(t0 + ms(430))); // 100 < 200
        assert!(player.tick(t0 + ms(530)));
        assert_eq!(player.current_index(), 0); // loops
    }

    #[test]
    fn tick_advances_at_most_one_frame() {
        let mut player = loaded(five_frames(), 5.0);
        let t0 = Instant::now();
        player.tick(t0);
        assert!(player.tick(t0 + Duration::from_secs(60)));
        assert_eq!(player.current_index(), 1);
    }

    #[test]
    fn tick_is_noop_when_paused() {
        let mut player = loaded(five_frames(), 5.0);
        player.pause();
        let t0 = Instant::now();
        assert!(!player.tick(t0));
        assert!(!player.tick(t0 + Duration::from_secs(5)));
        assert_eq!(player.current_index(), 0);
    }

    #[test]
    fn resume_does_not_jump() {
        let mut player = loaded(five_frames(), 5.0);
        let t0 = Instant::now();
        player.tick(t0);
        player.pause();
        player.play();
        // Long gap since the old baseline: only a new baseline is recorded
        assert!(!player.tick(t0 + Duration::from_secs(10)));
        assert_eq!(player.current_index(), 0);
        assert!(player.tick(t0 + Duration::from_secs(10) + ms(100)));
        assert_eq!(player.current_index(), 1);
    }

    #[test]
    fn toggle_flips_playing() {
        let mut player = loaded(five_frames(), 5.0);
        player.toggle_play();
        assert!(!player.is_playing());
        player.toggle_play();
        assert!(player.is_playing());
    }

    #[test]
    fn steps_clamp_and_pause() {
        let mut player = loaded(five_frames(), 5.0);
        player.step_backward();
        assert_eq!(player.current_index(), 0);
        assert!(!player.is_playing());

        for _ in 0..10 {
            player.step_forward();
        }
        assert_eq!(player.current_index(), 4);
        player.step_backward();
        assert_eq!(player.current_index(), 3);
    }

    #[test]
    fn seek_endpoints_and_clamping() {
        let mut player = loaded(five_frames(), 5.0);
        player.seek_to_fraction(1.0);
        assert_eq!(player.current_index(), 4);
        player.seek_to_fraction(0.0);
        assert_eq!(player.current_index(), 0);
        player.seek_to_fraction(0.5);
        assert_eq!(player.current_index(), 2);
        player.seek_to_fraction(42.0);
        assert_eq!(player.current_index(), 4);
        player.seek_to_fraction(-1.0);
        assert_eq!(player.current_index(), 0);
        player.seek_to_frame(99);
        assert_eq!(player.current_index(), 4);
    }

    #[test]
    fn seek_keeps_play_state() {
        let mut player = loaded(five_frames(), 5.0);
        player.seek_to_fraction(0.7);
        assert!(player.is_playing());
        player.pause();
        player.seek_to_fraction(0.2);
        assert!(!player.is_playing());
    }

    #[test]
    fn restart_rewinds_and_plays() {
        let mut player = loaded(five_frames(), 5.0);
        player.step_forward();
        player.step_forward();
        player.restart();
        assert_eq!(player.current_index(), 0);
        assert!(player.is_playing());
        assert!(player.is_loop_running());
    }

    #[test]
    fn simulated_time_labels() {
        let mut player = loaded(five_frames(), 10.0);
        assert_eq!(player.current_simulated_time(), "0.00s");
        player.seek_to_frame(3);
        assert_eq!(player.current_simulated_time(), "6.00s");
        assert_eq!(player.total_time_label(), "10s");
        assert_eq!(player.frame_label(), "Frame 4/5");
        assert_eq!(player.progress(), 0.75);
    }

    #[test]
    fn simulated_time_monotonic_over_playback() {
        let mut player = loaded(five_frames(), 7.3);
        let mut prev = player.simulated_secs();
        for _ in 1..5 {
            player.step_forward();
            let t = player.simulated_secs();
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn empty_container_is_an_empty_state() {
        let mut player = loaded(fixtures::gif_bytes(4, 4, &[]), 12.0);
        assert_eq!(player.status(), &PlayerStatus::Empty);
        assert_eq!(player.frame_count(), 0);
        assert_eq!(player.current_simulated_time(), "0.00s");
        assert!(!player.is_loop_running());

        player.step_forward();
        player.seek_to_fraction(1.0);
        player.restart();
        assert!(!player.tick(Instant::now()));
        assert_eq!(player.current_index(), 0);
        assert!(player.current_frame().is_none());
    }

    #[test]
    fn header_only_container_is_an_empty_state() {
        let player = loaded(fixtures::bare_header_gif(4, 4), 12.0);
        assert_eq!(player.status(), &PlayerStatus::Empty);
        assert_eq!(player.canvas_size(), (4, 4));
        assert_eq!(player.current_simulated_time(), "0.00s");
        assert!(!player.is_loop_running());
    }

    #[test]
    fn malformed_header_is_unavailable_but_downloadable() {
        let bytes = fixtures::zero_width_gif();
        let mut player = loaded(bytes.clone(), 12.0);
        match player.status() {
            PlayerStatus::Unavailable { reason } => assert!(reason.contains("zero size"), "{reason}"),
            other => panic!("unexpected status: {other:?}"),
        }
        assert_eq!(player.frame_count(), 0);
        assert_eq!(player.download_bytes(), Some(bytes.as_slice()));
        assert!(player.info().downloadable);
        assert!(!player.is_loop_running());

        // Still accepts new loads
        player.load(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        assert_eq!(player.status(), &PlayerStatus::Ready);
    }

    #[test]
    fn render_loop_follows_play_state_and_visibility() {
        let mut player = loaded(five_frames(), 5.0);
        assert!(player.is_loop_running());
        player.pause();
        assert!(!player.is_loop_running());
        player.play();
        assert!(player.is_loop_running());
        player.set_visible(false);
        assert!(!player.is_loop_running());
        assert!(player.is_playing());
        player.set_visible(true);
        assert!(player.is_loop_running());
        player.step_forward();
        assert!(!player.is_loop_running());
    }

    #[test]
    fn ticks_arrive_while_running() {
        let mut player = loaded(five_frames(), 5.0);
        let ticks = player.ticks();
        let now = ticks.recv_timeout(Duration::from_secs(2)).unwrap();
        player.tick(now);
        player.pause();
        assert!(
            player
                .ticks()
                .recv_timeout(Duration::from_millis(30))
                .is_err()
        );
    }

    #[test]
    fn frames_show_composited_content() {
        let player = loaded(fixtures::three_frame_gif(), 3.0);
        let last = player.frame(2).unwrap();
        assert_eq!(last.pixel(1, 1), Some(BLUE));
        assert_eq!(last.pixel(0, 0), Some(RED));
    }

    fn wait_ready(player: &mut Player) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while player.status() == &PlayerStatus::Loading && Instant::now() < deadline {
            player.poll_load();
            std::thread::sleep(ms(5));
        }
    }

    #[test]
    fn async_load_reports_loading_then_ready() {
        let mut player = loaded(five_frames(), 5.0);
        assert!(player.is_loop_running());

        player.load_async(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        assert_eq!(player.status(), &PlayerStatus::Loading);
        assert!(!player.is_loop_running());
        assert_eq!(player.frame_count(), 0);
        assert!(player.download_bytes().is_some());

        wait_ready(&mut player);
        assert_eq!(player.status(), &PlayerStatus::Ready);
        assert_eq!(player.frame_count(), 3);
        assert!(player.is_loop_running());
    }

    #[test]
    fn lost_decoder_thread_makes_animation_unavailable() {
        let mut player = Player::default();
        player.loader = Some(AnimationLoader::disconnected());
        player.load_async(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        assert_eq!(player.status(), &PlayerStatus::Loading);

        assert!(player.poll_load());
        assert!(matches!(player.status(), PlayerStatus::Unavailable { .. }));
        assert!(!player.is_playing());
        assert!(player.download_bytes().is_some());

        // A new background load spawns a working decoder
        player.load_async(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        wait_ready(&mut player);
        assert_eq!(player.status(), &PlayerStatus::Ready);
    }

    #[test]
    fn newer_async_load_wins() {
        let mut player = Player::default();
        player.load_async(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        player.load_async(EncodedAnimation::from_bytes(five_frames()), 5.0);
        wait_ready(&mut player);
        assert_eq!(player.frame_count(), 5);
        assert_eq!(player.total_simulated_secs(), 5.0);
    }

    #[test]
    fn sync_load_supersedes_pending_async() {
        let mut player = Player::default();
        player.load_async(EncodedAnimation::from_bytes(five_frames()), 5.0);
        player.load(EncodedAnimation::from_bytes(fixtures::three_frame_gif()), 3.0);
        std::thread::sleep(ms(100));
        assert!(!player.poll_load());
        assert_eq!(player.frame_count(), 3);
    }
}
