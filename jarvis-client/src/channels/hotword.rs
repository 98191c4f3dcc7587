use shared::messages::HotwordEvent;
use crate::error::SessionError;
use crate::session::{Session, Subscription};

/// The `/hotword` channel: WAV clips out, detection events in
#[derive(Clone)]
pub struct HotwordChannel {
    session: Session,
}

impl HotwordChannel {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn send_wav(&self, wav: Vec<u8>) -> Result<(), SessionError> {
        self.session.send_binary(wav)
    }

    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&HotwordEvent) + Send + Sync + 'static,
    {
        self.session.on_message(move |frame| {
            let Some(text) = frame.as_text() else {
                return;
            };
            match HotwordEvent::parse(text) {
                Ok(event) => handler(&event),
                Err(_) => tracing::debug!("Hotword message: {}", text),
            }
        })
    }
}
