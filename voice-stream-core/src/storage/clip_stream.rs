use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::processing::ring_buffer::{Marker, RingBuffer};

/// Lifecycle notifications from an [`AudioClipStream`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipStreamEvent {
    /// Enough audio is buffered to start playback. Fires once.
    Ready { buffered_secs: f32 },
    /// Samples were appended.
    Updated { added_samples: u64 },
    /// No more samples will arrive. Fires once.
    Complete { total_samples: u64 },
}

pub type ClipStreamListener = Arc<dyn Fn(ClipStreamEvent) + Send + Sync + 'static>;

#[derive(Debug, Default)]
struct ClipState {
    added: u64,
    expected: Option<u64>,
    ready: bool,
    complete: bool,
}

/// Growing clip of decoded audio.
///
/// Decoded samples (interleaved) are appended to a ring buffer sized for
/// `max_length_secs`; playback and export read through markers. The clip
/// becomes ready once `ready_length_secs` of audio has been added, or on
/// completion if the whole clip is shorter.
pub struct AudioClipStream {
    channels: u16,
    sample_rate: u32,
    ready_samples: u64,
    buffer: RingBuffer<f32>,
    state: Mutex<ClipState>,
    listener: Option<ClipStreamListener>,
}

impl AudioClipStream {
    pub fn new(channels: u16, sample_rate: u32, ready_length_secs: f32, max_length_secs: f32) -> Self {
        let per_second = sample_rate as f64 * channels.max(1) as f64;
        let capacity = (max_length_secs as f64 * per_second).ceil() as usize;
        Self {
            channels: channels.max(1),
            sample_rate,
            ready_samples: (ready_length_secs as f64 * per_second).round() as u64,
            buffer: RingBuffer::new(capacity),
            state: Mutex::new(ClipState::default()),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: ClipStreamListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append interleaved samples.
    ///
    /// Fails with `InvalidState` once the clip is complete.
    pub fn add_samples(&self, samples: &[f32]) -> Result<(), StreamError> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut events = Vec::with_capacity(3);
        {
            let mut state = self.state.lock();
            if state.complete {
                return Err(StreamError::InvalidState(format!(
                    "clip is complete, {} samples rejected",
                    samples.len()
                )));
            }
            self.buffer.push(samples);
            state.added += samples.len() as u64;
            events.push(ClipStreamEvent::Updated {
                added_samples: samples.len() as u64,
            });
            if !state.ready && state.added >= self.ready_samples {
                state.ready = true;
                events.push(self.ready_event(state.added));
            }
            if state.expected.is_some_and(|expected| state.added >= expected) {
                self.complete_locked(&mut state, &mut events);
            }
        }
        self.emit(events);
        Ok(())
    }

    /// Declare the final length in samples. Completes the clip if that many
    /// have already arrived.
    pub fn set_expected_samples(&self, expected: u64) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            state.expected = Some(expected);
            if !state.complete && state.added >= expected {
                self.complete_locked(&mut state, &mut events);
            }
        }
        self.emit(events);
    }

    /// Mark the clip complete. Calling it again has no effect.
    pub fn mark_complete(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.complete {
                self.complete_locked(&mut state, &mut events);
            }
        }
        self.emit(events);
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().complete
    }

    /// Samples added since creation, including any no longer retained.
    pub fn added_samples(&self) -> u64 {
        self.state.lock().added
    }

    pub fn expected_samples(&self) -> Option<u64> {
        self.state.lock().expected
    }

    /// Duration of all audio added so far.
    pub fn length_secs(&self) -> f32 {
        self.secs(self.added_samples())
    }

    /// Reader positioned at the oldest retained sample.
    pub fn create_reader(&self) -> Marker<f32> {
        self.buffer.create_marker_at_oldest()
    }

    /// Reader positioned `offset_secs` after the start of the clip, clamped to
    /// the retained window and aligned to a whole frame.
    pub fn create_reader_at_time(&self, offset_secs: f32) -> Marker<f32> {
        let frame = (offset_secs.max(0.0) as f64 * self.sample_rate as f64).round() as i64;
        let target = frame.saturating_mul(self.channels as i64);
        let head = self.buffer.write_count() as i64;
        self.buffer.create_marker(target.saturating_sub(head))
    }

    fn secs(&self, samples: u64) -> f32 {
        (samples as f64 / (self.sample_rate as f64 * self.channels as f64)) as f32
    }

    fn ready_event(&self, added: u64) -> ClipStreamEvent {
        ClipStreamEvent::Ready {
            buffered_secs: self.secs(added),
        }
    }

    fn complete_locked(&self, state: &mut ClipState, events: &mut Vec<ClipStreamEvent>) {
        state.complete = true;
        if !state.ready {
            state.ready = true;
            events.push(self.ready_event(state.added));
        }
        log::debug!("Audio clip complete: {} samples ({:.2}s)", state.added, self.secs(state.added));
        events.push(ClipStreamEvent::Complete {
            total_samples: state.added,
        });
    }

    fn emit(&self, events: Vec<ClipStreamEvent>) {
        if let Some(listener) = &self.listener {
            for event in events {
                listener(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_clip(ready: f32, max: f32) -> (AudioClipStream, Arc<Mutex<Vec<ClipStreamEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let clip = AudioClipStream::new(1, 100, ready, max)
            .with_listener(Arc::new(move |event: ClipStreamEvent| sink.lock().push(event)));
        (clip, events)
    }

    fn kinds(events: &Mutex<Vec<ClipStreamEvent>>) -> Vec<&'static str> {
        events
            .lock()
            .iter()
            .map(|event| match event {
                ClipStreamEvent::Ready { .. } => "ready",
                ClipStreamEvent::Updated { .. } => "updated",
                ClipStreamEvent::Complete { .. } => "complete",
            })
            .collect()
    }

    #[test]
    fn ready_fires_once_at_threshold() {
        let (clip, events) = recording_clip(0.5, 10.0);

        clip.add_samples(&[0.0; 30]).unwrap();
        assert!(!clip.is_ready());
        clip.add_samples(&[0.0; 30]).unwrap();
        assert!(clip.is_ready());
        clip.add_samples(&[0.0; 30]).unwrap();

        assert_eq!(kinds(&events), vec!["updated", "updated", "ready", "updated"]);
        assert_eq!(events.lock()[2], ClipStreamEvent::Ready { buffered_secs: 0.6 });
    }

    #[test]
    fn short_clip_becomes_ready_on_completion() {
        let (clip, events) = recording_clip(1.0, 10.0);
        clip.add_samples(&[0.1; 10]).unwrap();
        clip.mark_complete();
        clip.mark_complete();

        assert!(clip.is_ready());
        assert!(clip.is_complete());
        assert_eq!(kinds(&events), vec!["updated", "ready", "complete"]);
        assert!(clip.add_samples(&[0.0]).is_err());
    }

    #[test]
    fn expected_length_completes_clip() {
        let (clip, events) = recording_clip(0.0, 10.0);
        clip.set_expected_samples(50);
        clip.add_samples(&[0.0; 20]).unwrap();
        assert!(!clip.is_complete());
        clip.add_samples(&[0.0; 30]).unwrap();

        assert!(clip.is_complete());
        assert_eq!(clip.expected_samples(), Some(50));
        assert_eq!(events.lock().last(), Some(&ClipStreamEvent::Complete { total_samples: 50 }));
    }

    #[test]
    fn readers_see_retained_window() {
        let (clip, _) = recording_clip(0.0, 1.0);
        let samples: Vec<f32> = (0..150).map(|i| i as f32).collect();
        clip.add_samples(&samples).unwrap();

        let mut reader = clip.create_reader();
        assert_eq!(reader.position(), 50);
        assert_eq!(reader.available(), 100);

        let mut at_time = clip.create_reader_at_time(1.2);
        let mut out = [0.0; 4];
        at_time.read(&mut out);
        assert_eq!(out, [120.0, 121.0, 122.0, 123.0]);

        // Before the retained window: clamped to the oldest sample.
        assert_eq!(clip.create_reader_at_time(0.1).position(), 50);
        assert!((clip.length_secs() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn reader_at_time_aligns_to_frames() {
        let clip = AudioClipStream::new(2, 10, 0.0, 5.0);
        clip.add_samples(&[0.0; 40]).unwrap();
        assert_eq!(clip.create_reader_at_time(0.5).position(), 10);
        assert_eq!(clip.create_reader_at_time(9.0).position(), 40);
    }
}
