//! Voice commands: record → transcribe → keyword → action.
//!
//! The [`SpeechCommandBridge`] runs on its own thread while speech driving
//! is active.  Drive intents are posted into the speech loop's mailbox;
//! "what is this" and "sing" are served by the bridge itself through the
//! camera, recognizer, synthesizer and speaker ports.
//!
//! Every external call can fail.  A failure abandons the current cycle
//! with a log line and the bridge listens again.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{Cue, EventSink, LedPort, Peripherals, Services, SpeechPort};
use crate::config::{KeywordEntry, SpeechConfig};
use crate::error::{Error, Result, ServiceError};
use crate::fsm::{Mailbox, NavOp};
use crate::task::delay_ms;

/// What a spoken phrase asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    /// Photograph and name the object in front of the car.
    Identify,
    Sing,
}

impl Intent {
    /// The speech loop op for a drive intent.
    pub fn drive_op(self) -> Option<NavOp> {
        match self {
            Self::Forward => Some(NavOp::Forward),
            Self::Backward => Some(NavOp::Backward),
            Self::Left => Some(NavOp::Left),
            Self::Right => Some(NavOp::Right),
            Self::Stop => Some(NavOp::Stop),
            Self::Identify | Self::Sing => None,
        }
    }
}

/// First keyword (in table order) whose phrase occurs in `text`,
/// compared lower-cased.
pub fn match_intent(text: &str, keywords: &[KeywordEntry]) -> Option<Intent> {
    let text = text.to_lowercase();
    keywords
        .iter()
        .find(|k| !k.phrase.is_empty() && text.contains(&k.phrase.to_lowercase()))
        .map(|k| k.intent)
}

/// Turns recorded speech into loop ops and spoken answers.
pub struct SpeechCommandBridge {
    speech: Arc<dyn SpeechPort>,
    services: Services,
    led: Option<Arc<dyn LedPort>>,
    mailbox: Arc<Mailbox>,
    sink: Arc<dyn EventSink>,
    config: SpeechConfig,
}

impl SpeechCommandBridge {
    pub fn new(
        speech: Arc<dyn SpeechPort>,
        services: Services,
        hw: &Peripherals,
        mailbox: Arc<Mailbox>,
        sink: Arc<dyn EventSink>,
        config: &SpeechConfig,
    ) -> Self {
        Self {
            speech,
            services,
            led: hw.led.clone(),
            mailbox,
            sink,
            config: config.clone(),
        }
    }

    /// Listen until `keep_running` turns false.
    pub fn run(&self, keep_running: impl Fn() -> bool) {
        info!("Listening for voice commands");
        while keep_running() {
            if let Err(e) = self.cycle() {
                warn!("Voice command abandoned: {}", e);
                delay_ms(self.config.retry_ms);
            }
        }
        info!("Stopped listening");
    }

    /// One record → act cycle.
    pub fn cycle(&self) -> Result<()> {
        match self.listen()? {
            Some(intent) => {
                info!("Voice command: {:?}", intent);
                self.sink.emit(&AppEvent::VoiceCommand(intent));
                self.handle(intent)
            }
            None => Ok(()),
        }
    }

    /// Record a clip (status LED lit meanwhile) and match it.
    pub fn listen(&self) -> Result<Option<Intent>> {
        if let Some(led) = &self.led {
            led.on();
        }
        let clip = self.speech.record_clip(self.config.clip_secs);
        if let Some(led) = &self.led {
            led.off();
        }
        let clip = clip.map_err(Error::Record)?;

        let text = self.speech.to_text(&clip).map_err(Error::Transcribe)?;
        debug!("heard: {:?}", text);
        Ok(match_intent(&text, &self.config.keywords))
    }

    pub fn handle(&self, intent: Intent) -> Result<()> {
        if let Some(op) = intent.drive_op() {
            self.mailbox.post(op);
            return Ok(());
        }
        match intent {
            Intent::Identify => self.identify(),
            Intent::Sing => self.play_cue(Cue::Song),
            _ => Ok(()),
        }
    }

    /// Photograph, recognise and say what is in front of the car.
    pub fn identify(&self) -> Result<()> {
        let camera = self.services.camera.as_deref().ok_or(Error::Missing("camera"))?;
        let images = self.services.images.as_deref().ok_or(Error::Missing("image recognizer"))?;

        let photo = camera.take_photo().map_err(Error::Camera)?;
        self.play_cue(Cue::Thinking)?;

        let label = match images.recognize(&photo) {
            Ok(label) if !label.trim().is_empty() => label,
            Ok(_) => {
                self.play_cue(Cue::Failure)?;
                return Err(Error::Recognize(ServiceError::BadResponse));
            }
            Err(e) => {
                self.play_cue(Cue::Failure)?;
                return Err(Error::Recognize(e));
            }
        };
        info!("Recognised: {}", label);

        let tts = self.services.tts.as_deref().ok_or(Error::Missing("text-to-speech"))?;
        let answer = format!("{} {}", self.config.answer_prefix, label.trim());
        let audio = tts.synthesize(&answer).map_err(Error::Synthesize)?;
        self.audio()?.play(&audio).map_err(Error::Playback)
    }

    fn play_cue(&self, cue: Cue) -> Result<()> {
        self.audio()?.play_cue(cue).map_err(Error::Playback)
    }

    fn audio(&self) -> Result<&dyn crate::app::ports::AudioPort> {
        self.services.audio.as_deref().ok_or(Error::Missing("speaker"))
    }
}
