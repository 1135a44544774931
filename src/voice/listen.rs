//! Utterance detection
//!
//! Energy-based endpointing: calibrate against ambient noise, wait for the
//! energy to rise above the threshold, then collect the phrase until a pause,
//! the phrase limit, or the listen timeout.

use std::time::{Duration, Instant};

use super::capture::AudioInput;
use super::stt::CaptureError;

/// Floor for the speech threshold after calibration
const MIN_ENERGY_THRESHOLD: f32 = 0.01;

/// Speech must exceed ambient energy by this factor
const DYNAMIC_ENERGY_RATIO: f32 = 1.5;

/// Analysis frame length in milliseconds
const FRAME_MS: u32 = 30;

/// Slack added to the wall-clock guard on top of the audio bounds
const DEADLINE_SLACK: Duration = Duration::from_secs(2);

/// Bounds for one listening session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOptions {
    /// Ambient-noise calibration window
    pub ambient_duration: Duration,
    /// How long to wait for speech to start
    pub timeout: Duration,
    /// Maximum length of a phrase once started
    pub phrase_time_limit: Duration,
    /// Silence that ends a phrase
    pub pause_threshold: Duration,
    /// Shortest speech burst treated as a phrase
    pub min_phrase: Duration,
    /// Delay between buffer drains
    pub poll_interval: Duration,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            ambient_duration: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(10),
            pause_threshold: Duration::from_millis(800),
            min_phrase: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ListenOptions {
    /// Default bounds with explicit listen timeout and phrase limit
    #[must_use]
    pub fn with_bounds(timeout: Duration, phrase_time_limit: Duration) -> Self {
        Self {
            timeout,
            phrase_time_limit,
            ..Self::default()
        }
    }

    /// Wall-clock guard for a whole listening session
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.ambient_duration
            .saturating_add(self.timeout)
            .saturating_add(self.phrase_time_limit)
            .saturating_add(DEADLINE_SLACK)
    }
}

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Measuring ambient noise
    Calibrating,
    /// Waiting for speech to start
    Waiting,
    /// Collecting a phrase
    Speaking,
    /// Phrase finished (pause or phrase limit)
    Complete,
    /// No speech before the timeout
    TimedOut,
}

/// Splits a sample stream into a single utterance
pub struct UtteranceDetector {
    state: DetectorState,
    threshold: f32,
    frame_len: usize,
    ambient_samples: usize,
    timeout_samples: usize,
    phrase_limit_samples: usize,
    pause_samples: usize,
    min_phrase_samples: usize,
    ambient: Vec<f32>,
    waited: usize,
    phrase: Vec<f32>,
    silence: usize,
}

impl UtteranceDetector {
    /// Create a detector for the given sample rate and bounds
    #[must_use]
    pub fn new(sample_rate: u32, options: &ListenOptions) -> Self {
        let to_samples = |d: Duration| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = (d.as_secs_f64() * f64::from(sample_rate)) as usize;
            n
        };

        let frame_len = ((sample_rate * FRAME_MS) / 1000).max(1) as usize;
        let ambient_samples = to_samples(options.ambient_duration);

        Self {
            state: if ambient_samples == 0 {
                DetectorState::Waiting
            } else {
                DetectorState::Calibrating
            },
            threshold: MIN_ENERGY_THRESHOLD,
            frame_len,
            ambient_samples,
            timeout_samples: to_samples(options.timeout),
            phrase_limit_samples: to_samples(options.phrase_time_limit),
            pause_samples: to_samples(options.pause_threshold),
            min_phrase_samples: to_samples(options.min_phrase),
            ambient: Vec::new(),
            waited: 0,
            phrase: Vec::new(),
            silence: 0,
        }
    }

    /// Feed samples and return the resulting state
    pub fn push(&mut self, samples: &[f32]) -> DetectorState {
        for frame in samples.chunks(self.frame_len) {
            if matches!(self.state, DetectorState::Complete | DetectorState::TimedOut) {
                break;
            }
            self.process_frame(frame);
        }
        self.state
    }

    fn process_frame(&mut self, frame: &[f32]) {
        let energy = calculate_energy(frame);

        match self.state {
            DetectorState::Calibrating => {
                self.ambient.extend_from_slice(frame);
                if self.ambient.len() >= self.ambient_samples {
                    let ambient_energy = calculate_energy(&self.ambient);
                    self.threshold = (ambient_energy * DYNAMIC_ENERGY_RATIO).max(MIN_ENERGY_THRESHOLD);
                    self.ambient = Vec::new();
                    self.state = DetectorState::Waiting;
                    tracing::debug!(ambient_energy, threshold = self.threshold, "calibrated");
                }
            }
            DetectorState::Waiting => {
                if energy > self.threshold {
                    self.state = DetectorState::Speaking;
                    self.phrase.clear();
                    self.phrase.extend_from_slice(frame);
                    self.silence = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += frame.len();
                    if self.waited >= self.timeout_samples {
                        tracing::debug!(waited = self.waited, "no speech before timeout");
                        self.state = DetectorState::TimedOut;
                    }
                }
            }
            DetectorState::Speaking => {
                self.phrase.extend_from_slice(frame);
                if energy > self.threshold {
                    self.silence = 0;
                } else {
                    self.silence += frame.len();
                }

                if self.phrase.len() >= self.phrase_limit_samples {
                    tracing::debug!(samples = self.phrase.len(), "phrase limit reached");
                    self.state = DetectorState::Complete;
                } else if self.silence >= self.pause_samples {
                    if self.phrase.len() - self.silence >= self.min_phrase_samples {
                        tracing::debug!(samples = self.phrase.len(), "phrase complete");
                        self.state = DetectorState::Complete;
                    } else {
                        // Too short to be speech, keep waiting
                        self.waited += self.phrase.len();
                        self.phrase.clear();
                        self.silence = 0;
                        self.state = if self.waited >= self.timeout_samples {
                            DetectorState::TimedOut
                        } else {
                            DetectorState::Waiting
                        };
                    }
                }
            }
            DetectorState::Complete | DetectorState::TimedOut => {}
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Energy threshold in effect
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Take the collected phrase, clearing it
    pub fn take_phrase(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.phrase)
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Stops the input when dropped, so every exit path releases the device
struct ActiveInput<'a> {
    input: &'a mut dyn AudioInput,
}

impl<'a> ActiveInput<'a> {
    fn start(input: &'a mut dyn AudioInput) -> Result<Self, CaptureError> {
        input
            .start()
            .map_err(|e| CaptureError::Microphone(e.to_string()))?;
        Ok(Self { input })
    }
}

impl Drop for ActiveInput<'_> {
    fn drop(&mut self) {
        self.input.stop();
    }
}

/// Listen for one utterance on `input`
///
/// # Errors
///
/// Returns [`CaptureError::NoSpeechDetected`] if nothing is said before the
/// timeout, or [`CaptureError::Microphone`] if the input cannot start
pub async fn listen(
    input: &mut dyn AudioInput,
    options: &ListenOptions,
) -> Result<Vec<f32>, CaptureError> {
    let active = ActiveInput::start(input)?;
    let mut detector = UtteranceDetector::new(active.input.sample_rate(), options);
    // No deadline if the bounds overflow the clock
    let deadline = Instant::now().checked_add(options.max_wait());

    loop {
        let samples = active.input.take_buffer();
        match detector.push(&samples) {
            DetectorState::Complete => return Ok(detector.take_phrase()),
            DetectorState::TimedOut => return Err(CaptureError::NoSpeechDetected),
            DetectorState::Calibrating | DetectorState::Waiting | DetectorState::Speaking => {}
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::warn!(state = ?detector.state(), "listen deadline exceeded");
            return match detector.state() {
                DetectorState::Speaking => Ok(detector.take_phrase()),
                _ => Err(CaptureError::NoSpeechDetected),
            };
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}
