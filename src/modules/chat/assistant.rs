/// Assistant Reply Sequencer
///
/// Scripted support assistant. Entering an empty assistant conversation plays a welcome
/// line, then an info line; every user message gets one canned reply. The sequencer only
/// decides *what* happens next and after how long; the owning actor runs the timers.
use std::time::Duration;

use crate::constants::{INFO_DELAY, REPLY_DELAY, WELCOME_DELAY};

#[derive(Debug, Clone)]
pub struct AssistantScript {
    pub welcome: String,
    pub info: String,
    pub reply: String,
    pub welcome_delay: Duration,
    pub info_delay: Duration,
    pub reply_delay: Duration,
}

impl Default for AssistantScript {
    fn default() -> Self {
        Self {
            welcome: "Hi! I'm the support assistant. How can I help you today?".to_string(),
            info: "You can ask about appointments, billing or your care team. A staff member will follow up if needed.".to_string(),
            reply: "Thanks for your message! A member of our team will get back to you shortly.".to_string(),
            welcome_delay: WELCOME_DELAY,
            info_delay: INFO_DELAY,
            reply_delay: REPLY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    NotStarted,
    AwaitingWelcome,
    AwaitingInfo,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Welcome,
    Info,
    Reply,
}

/// Next timer to arm.
pub type Schedule = Option<(Beat, Duration)>;

#[derive(Debug)]
pub struct AssistantSequencer {
    script: AssistantScript,
    phase: SequencePhase,
    pending_replies: usize,
}

impl AssistantSequencer {
    pub fn new(script: AssistantScript) -> Self {
        Self { script, phase: SequencePhase::NotStarted, pending_replies: 0 }
    }

    pub fn phase(&self) -> SequencePhase {
        self.phase
    }

    /// The conversation became ready. The welcome runs at most once per sequencer and
    /// only when the conversation has no messages yet.
    pub fn on_ready(&mut self, has_messages: bool) -> Schedule {
        if self.phase != SequencePhase::NotStarted {
            return None;
        }
        if has_messages {
            self.phase = SequencePhase::Done;
            return None;
        }
        self.phase = SequencePhase::AwaitingWelcome;
        Some((Beat::Welcome, self.script.welcome_delay))
    }

    pub fn on_user_message(&mut self) -> (Beat, Duration) {
        self.pending_replies += 1;
        (Beat::Reply, self.script.reply_delay)
    }

    /// A timer fired. Returns the line to post (if the beat is still expected) and the
    /// next timer to arm.
    pub fn on_beat(&mut self, beat: Beat) -> (Option<String>, Schedule) {
        match (beat, self.phase) {
            (Beat::Welcome, SequencePhase::AwaitingWelcome) => {
                self.phase = SequencePhase::AwaitingInfo;
                (Some(self.script.welcome.clone()), Some((Beat::Info, self.script.info_delay)))
            }
            (Beat::Info, SequencePhase::AwaitingInfo) => {
                self.phase = SequencePhase::Done;
                (Some(self.script.info.clone()), None)
            }
            (Beat::Reply, _) if self.pending_replies > 0 => {
                self.pending_replies -= 1;
                (Some(self.script.reply.clone()), None)
            }
            _ => (None, None),
        }
    }

    /// Whether a scripted line is on its way.
    pub fn is_typing(&self) -> bool {
        matches!(self.phase, SequencePhase::AwaitingWelcome | SequencePhase::AwaitingInfo)
            || self.pending_replies > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_then_info() {
        let mut seq = AssistantSequencer::new(AssistantScript::default());
        assert!(!seq.is_typing());

        assert_eq!(seq.on_ready(false), Some((Beat::Welcome, Duration::from_millis(6_000))));
        assert!(seq.is_typing());

        let (line, next) = seq.on_beat(Beat::Welcome);
        assert!(line.is_some());
        assert_eq!(next, Some((Beat::Info, Duration::from_millis(1_500))));

        let (line, next) = seq.on_beat(Beat::Info);
        assert!(line.is_some());
        assert_eq!(next, None);
        assert_eq!(seq.phase(), SequencePhase::Done);
        assert!(!seq.is_typing());
    }

    #[test]
    fn test_welcome_runs_once() {
        let mut seq = AssistantSequencer::new(AssistantScript::default());
        assert!(seq.on_ready(false).is_some());
        assert!(seq.on_ready(false).is_none());

        seq.on_beat(Beat::Welcome);
        seq.on_beat(Beat::Info);
        assert!(seq.on_ready(false).is_none());
        // a stray duplicate beat posts nothing
        assert_eq!(seq.on_beat(Beat::Welcome), (None, None));
    }

    #[test]
    fn test_existing_messages_skip_welcome() {
        let mut seq = AssistantSequencer::new(AssistantScript::default());
        assert!(seq.on_ready(true).is_none());
        assert_eq!(seq.phase(), SequencePhase::Done);
    }

    #[test]
    fn test_one_reply_per_user_message() {
        let mut seq = AssistantSequencer::new(AssistantScript::default());
        seq.on_ready(true);

        assert_eq!(seq.on_user_message(), (Beat::Reply, Duration::from_millis(2_000)));
        seq.on_user_message();
        assert!(seq.is_typing());

        assert!(seq.on_beat(Beat::Reply).0.is_some());
        assert!(seq.is_typing());
        assert!(seq.on_beat(Beat::Reply).0.is_some());
        assert!(!seq.is_typing());
        assert!(seq.on_beat(Beat::Reply).0.is_none());
    }
}
