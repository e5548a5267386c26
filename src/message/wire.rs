//! Protobuf wire schema.
//!
//! Field numbers match the server's `proto.proto`. Only the fields this
//! client reads or writes are declared; prost skips unknown fields (such as
//! the legacy `states` list) when decoding.

/// Envelope for every request and response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Msg {
    /// Set on responses.
    #[prost(bool, optional, tag = "2")]
    pub ok: Option<bool>,
    /// Set on failed responses.
    #[prost(string, optional, tag = "3")]
    pub error: Option<String>,
    /// Set on query requests.
    #[prost(message, optional, tag = "5")]
    pub query: Option<Query>,
    /// Event batch (requests) or query results (responses).
    #[prost(message, repeated, tag = "6")]
    pub events: Vec<Event>,
}

/// A query expression.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Query {
    /// Query text, e.g. `service = "api" and metric > 3`.
    #[prost(string, optional, tag = "1")]
    pub string: Option<String>,
}

/// A single observation on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
    /// Unix time in seconds.
    #[prost(int64, optional, tag = "1")]
    pub time: Option<i64>,
    /// Free-form state, e.g. `ok` or `critical`.
    #[prost(string, optional, tag = "2")]
    pub state: Option<String>,
    /// Service name.
    #[prost(string, optional, tag = "3")]
    pub service: Option<String>,
    /// Originating host.
    #[prost(string, optional, tag = "4")]
    pub host: Option<String>,
    /// Human-readable description.
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
    /// Labels.
    #[prost(string, repeated, tag = "7")]
    pub tags: Vec<String>,
    /// Seconds the event stays valid.
    #[prost(float, optional, tag = "8")]
    pub ttl: Option<f32>,
    /// Key/value pairs.
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<Attribute>,
    /// Unix time in microseconds; used when `time` is absent.
    #[prost(int64, optional, tag = "10")]
    pub time_micros: Option<i64>,
    /// Integer metric.
    #[prost(sint64, optional, tag = "13")]
    pub metric_sint64: Option<i64>,
    /// Double-precision metric.
    #[prost(double, optional, tag = "14")]
    pub metric_d: Option<f64>,
    /// Single-precision metric; the only slot this client writes.
    #[prost(float, optional, tag = "15")]
    pub metric_f: Option<f32>,
}

/// Free-form key/value pair attached to an event.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Attribute {
    /// Attribute name.
    #[prost(string, required, tag = "1")]
    pub key: String,
    /// Attribute value.
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}
