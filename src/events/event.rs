//! # Events exchanged between cells.
//!
//! An [`Event`] is an immutable triple of topic, [`Payload`], and [`Scene`].
//! Events are cloned during fan-out, which is cheap: the payload map and the
//! scene are shared behind `Arc`s.
//!
//! Equality between events is by identity; the type deliberately implements
//! no `PartialEq`.

use crate::error::CellError;

use super::payload::{Payload, Scene};

/// Immutable event: topic, payload, scene.
#[derive(Clone, Debug)]
pub struct Event {
    topic: String,
    payload: Payload,
    scene: Scene,
}

impl Event {
    /// Creates a new event.
    ///
    /// Anything convertible into a [`Payload`] is accepted; scalars wrap into
    /// a single-entry payload under [`DEFAULT_KEY`](crate::DEFAULT_KEY).
    ///
    /// Fails with `InvalidEvent` if the topic is empty.
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Payload>,
        scene: Scene,
    ) -> Result<Self, CellError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(CellError::InvalidEvent {
                reason: "topic must not be empty".to_string(),
            });
        }
        Ok(Self {
            topic,
            payload: payload.into(),
            scene,
        })
    }

    /// The event topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The event payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The scene carried along with the event.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::payload::Value;

    #[test]
    fn scalar_payloads_wrap_under_the_default_key() {
        let event = Event::new("ping", 1, Scene::none()).unwrap();
        assert_eq!(event.topic(), "ping");
        assert_eq!(event.payload().default_value(), Some(&Value::Int(1)));
    }

    #[test]
    fn empty_topics_are_rejected() {
        let err = Event::new("", 1, Scene::none()).unwrap_err();
        assert!(matches!(err, CellError::InvalidEvent { .. }));
    }
}
