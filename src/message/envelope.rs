//! The protocol envelope.

use prost::Message as _;

use super::event::Event;
use super::wire;
use crate::core::ProtocolError;

/// Server reply to an event batch or query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Whether the server accepted the request.
    pub ok: bool,
    /// Server-side error text, if any.
    pub error: Option<String>,
    /// Query results.
    pub events: Vec<Event>,
}

/// A protocol message: exactly one of event batch, query or response.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Events to submit.
    Events(Vec<Event>),
    /// A query expression to evaluate.
    Query(String),
    /// A server reply.
    Response(Response),
}

impl Message {
    /// Build an event batch.
    pub fn event_batch(events: impl IntoIterator<Item = Event>) -> Self {
        Message::Events(events.into_iter().collect())
    }

    /// Build a query.
    pub fn query(query: impl Into<String>) -> Self {
        Message::Query(query.into())
    }

    /// The no-op response: not ok, no error, no events.
    pub fn empty() -> Self {
        Message::Response(Response::default())
    }

    /// `ok` flag of a response; false for every other shape.
    pub fn ok(&self) -> bool {
        matches!(self, Message::Response(Response { ok: true, .. }))
    }

    /// Server error text of a response.
    pub fn error(&self) -> Option<&str> {
        match self {
            Message::Response(response) => response.error.as_deref(),
            _ => None,
        }
    }

    /// Events carried by a batch or a response.
    pub fn events(&self) -> &[Event] {
        match self {
            Message::Events(events) => events,
            Message::Response(response) => &response.events,
            Message::Query(_) => &[],
        }
    }

    /// Consume the message and keep its events.
    pub fn into_events(self) -> Vec<Event> {
        match self {
            Message::Events(events) => events,
            Message::Response(response) => response.events,
            Message::Query(_) => Vec::new(),
        }
    }

    /// Query text, if this is a query.
    pub fn query_string(&self) -> Option<&str> {
        match self {
            Message::Query(q) => Some(q),
            _ => None,
        }
    }

    /// Serialize to protobuf bytes (no length prefix).
    pub fn encode(&self) -> Vec<u8> {
        wire::Msg::from(self.clone()).encode_to_vec()
    }

    /// Deserialize from protobuf bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(wire::Msg::decode(bytes)?.into())
    }
}

impl From<Message> for wire::Msg {
    fn from(message: Message) -> Self {
        match message {
            Message::Events(events) => wire::Msg {
                events: events.into_iter().map(Into::into).collect(),
                ..Default::default()
            },
            Message::Query(string) => wire::Msg {
                query: Some(wire::Query {
                    string: Some(string),
                }),
                ..Default::default()
            },
            Message::Response(response) => wire::Msg {
                ok: Some(response.ok),
                error: response.error,
                events: response.events.into_iter().map(Into::into).collect(),
                ..Default::default()
            },
        }
    }
}

impl From<wire::Msg> for Message {
    fn from(msg: wire::Msg) -> Self {
        if let Some(query) = msg.query {
            return Message::Query(query.string.unwrap_or_default());
        }
        let events: Vec<Event> = msg.events.into_iter().map(Into::into).collect();
        if msg.ok.is_some() || msg.error.is_some() {
            Message::Response(Response {
                ok: msg.ok.unwrap_or(false),
                error: msg.error,
                events,
            })
        } else {
            Message::Events(events)
        }
    }
}
