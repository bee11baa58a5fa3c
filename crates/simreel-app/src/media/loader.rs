use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use thiserror::Error;

use super::decoder::{self, DecodeError, DecodeOptions, DecodedAnimation};
use crate::payload::EncodedAnimation;

/// Request sent to the background decode thread.
struct DecodeRequest {
    animation: EncodedAnimation,
    options: DecodeOptions,
    generation: u64,
}

/// Result sent back from the background thread.
pub struct DecodeResult {
    pub animation: EncodedAnimation,
    pub decoded: Result<DecodedAnimation, DecodeError>,
    pub generation: u64,
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("background decoder stopped")]
    Disconnected,
}

/// Background GIF decoding with generation-based cancellation.
///
/// Only the most recent request matters: the thread skips queued requests
/// that have been superseded, and `try_recv` drops results whose generation
/// is older than the latest request.
pub struct AnimationLoader {
    request_tx: Option<Sender<DecodeRequest>>,
    result_rx: Receiver<DecodeResult>,
    generation: u64,
    thread: Option<JoinHandle<()>>,
}

impl AnimationLoader {
    pub fn new() -> std::io::Result<Self> {
        let (request_tx, request_rx) = unbounded::<DecodeRequest>();
        let (result_tx, result_rx) = unbounded::<DecodeResult>();

        let handle = thread::Builder::new()
            .name("simreel-decoder".into())
            .spawn(move || Self::decode_thread(request_rx, result_tx))?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            generation: 0,
            thread: Some(handle),
        })
    }

    /// Submit a decode. Supersedes any earlier request; returns its generation.
    pub fn request(&mut self, animation: EncodedAnimation, options: DecodeOptions) -> u64 {
        self.generation += 1;
        let request = DecodeRequest {
            animation,
            options,
            generation: self.generation,
        };
        if let Some(tx) = &self.request_tx {
            if tx.send(request).is_err() {
                log::warn!("Decoder thread gone; request {} dropped", self.generation);
            }
        }
        self.generation
    }

    /// Invalidate any in-flight decode without submitting a new one.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Loader whose decode thread has already gone away.
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        let (_, result_rx) = unbounded::<DecodeResult>();
        Self {
            request_tx: None,
            result_rx,
            generation: 0,
            thread: None,
        }
    }

    /// Poll for the result of the latest request. Stale results are discarded.
    /// Fails once the decode thread is gone, since nothing can arrive anymore.
    pub fn try_recv(&mut self) -> Result<Option<DecodeResult>, LoaderError> {
        loop {
            match self.result_rx.try_recv() {
                Ok(result) if result.generation == self.generation => return Ok(Some(result)),
                Ok(result) => {
                    log::debug!(
                        "Discarded stale decode result (gen {} vs current {})",
                        result.generation,
                        self.generation
                    );
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Decoder thread disconnected");
                    return Err(LoaderError::Disconnected);
                }
            }
        }
    }

    fn decode_thread(request_rx: Receiver<DecodeRequest>, result_tx: Sender<DecodeResult>) {
        // Channel closed: the loader was dropped
        while let Ok(mut request) = request_rx.recv() {
            // Skip to the newest queued request
            while let Ok(newer) = request_rx.try_recv() {
                log::debug!(
                    "Decoder: skipping gen {} for newer gen {}",
                    request.generation,
                    newer.generation
                );
                request = newer;
            }

            let decoded = decoder::decode_with(request.animation.bytes(), &request.options);
            let result = DecodeResult {
                animation: request.animation,
                decoded,
                generation: request.generation,
            };
            if result_tx.send(result).is_err() {
                return;
            }
        }
        log::debug!("Decoder thread exiting (channel closed)");
    }
}

impl Drop for AnimationLoader {
    fn drop(&mut self) {
        // Dropping the sender ends the thread's recv loop
        self.request_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
