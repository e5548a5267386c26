//! Monitoring events.

use std::collections::BTreeMap;
use std::fmt::Display;

use super::wire;

/// Conversion into the single float metric slot.
///
/// Integers are coerced; there is no separate integer metric.
pub trait IntoMetric {
    /// Convert to the wire metric value.
    fn into_metric(self) -> f32;
}

macro_rules! impl_into_metric {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoMetric for $t {
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                fn into_metric(self) -> f32 {
                    self as f32
                }
            }
        )*
    };
}

impl_into_metric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// A single monitoring observation.
///
/// Fields are fixed at compile time. `tags` only ever grow; setting
/// attributes replaces the whole attribute map.
///
/// # Example
///
/// ```
/// use riemann_client::message::Event;
///
/// let event = Event::new()
///     .with_host("web-1")
///     .with_service("api latency")
///     .with_metric(12)
///     .with_tag("production")
///     .with_attribute("retries", 3);
///
/// assert_eq!(event.metric(), Some(12.0));
/// assert_eq!(event.attributes()["retries"], "3");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    host: Option<String>,
    service: Option<String>,
    state: Option<String>,
    time: Option<i64>,
    description: Option<String>,
    tags: Vec<String>,
    metric: Option<f32>,
    ttl: Option<f32>,
    attributes: BTreeMap<String, String>,
}

impl Event {
    /// Create an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the originating host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the state string (e.g. `ok`, `warning`, `critical`).
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set the event time in seconds since the epoch.
    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Set the free-form description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the metric, coercing integers to float.
    pub fn with_metric(mut self, metric: impl IntoMetric) -> Self {
        self.set_metric(metric);
        self
    }

    /// Set the time-to-live in seconds.
    pub fn with_ttl(mut self, ttl: f32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Append one tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Append several tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.add_tags(tags);
        self
    }

    /// Insert one attribute, coercing the value to a string.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    /// Replace all attributes.
    pub fn with_attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Display,
    {
        self.set_attributes(attributes);
        self
    }

    /// Set the metric in place.
    pub fn set_metric(&mut self, metric: impl IntoMetric) {
        self.metric = Some(metric.into_metric());
    }

    /// Append tags in place.
    pub fn add_tags<I, T>(&mut self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    /// Replace the attribute map, coercing every value with `Display`.
    pub fn set_attributes<I, K, V>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Display,
    {
        self.attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
    }

    /// Originating host.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Service name.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// State string.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Time in seconds since the epoch.
    pub fn time(&self) -> Option<i64> {
        self.time
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Metric value.
    pub fn metric(&self) -> Option<f32> {
        self.metric
    }

    /// Time-to-live in seconds.
    pub fn ttl(&self) -> Option<f32> {
        self.ttl
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Attributes, sorted by key.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

impl From<Event> for wire::Event {
    fn from(event: Event) -> Self {
        wire::Event {
            time: event.time,
            state: event.state,
            service: event.service,
            host: event.host,
            description: event.description,
            tags: event.tags,
            ttl: event.ttl,
            attributes: event
                .attributes
                .into_iter()
                .map(|(key, value)| wire::Attribute {
                    key,
                    value: Some(value),
                })
                .collect(),
            time_micros: None,
            metric_sint64: None,
            metric_d: None,
            metric_f: event.metric,
        }
    }
}

impl From<wire::Event> for Event {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn from(event: wire::Event) -> Self {
        let metric = event
            .metric_f
            .or(event.metric_d.map(|m| m as f32))
            .or(event.metric_sint64.map(|m| m as f32));
        let time = event
            .time
            .or(event.time_micros.map(|us| us.div_euclid(1_000_000)));

        Self {
            host: event.host,
            service: event.service,
            state: event.state,
            time,
            description: event.description,
            tags: event.tags,
            metric,
            ttl: event.ttl,
            attributes: event
                .attributes
                .into_iter()
                .map(|a| (a.key, a.value.unwrap_or_default()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_metric_int_and_float() {
        let int_event = Event::new().with_metric(12);
        let float_event = Event::new().with_metric(12.5);
        assert_eq!(int_event.metric(), Some(12.0));
        assert_eq!(float_event.metric(), Some(12.5));

        let wire_event: wire::Event = int_event.into();
        assert_eq!(wire_event.metric_f, Some(12.0));
        assert_eq!(wire_event.metric_sint64, None);
        assert_eq!(wire_event.metric_d, None);
    }

    #[test]
    fn test_attribute_coercion() {
        let mut attrs = HashMap::new();
        attrs.insert("retries", 3);
        let event = Event::new().with_attributes(attrs);

        let wire_event: wire::Event = event.into();
        assert_eq!(wire_event.attributes.len(), 1);
        assert_eq!(wire_event.attributes[0].key, "retries");
        assert_eq!(wire_event.attributes[0].value.as_deref(), Some("3"));
    }

    #[test]
    fn test_attributes_replace() {
        let event = Event::new()
            .with_attribute("a", "1")
            .with_attributes([("b", 2.5)]);
        assert_eq!(event.attributes().len(), 1);
        assert_eq!(event.attributes()["b"], "2.5");
    }

    #[test]
    fn test_tags_append() {
        let mut event = Event::new().with_tags(["one", "two"]);
        event.add_tags(vec![String::from("three")]);
        let event = event.with_tag("four");
        assert_eq!(event.tags(), ["one", "two", "three", "four"]);
    }

    #[test]
    fn test_decode_prefers_float_metric() {
        let wire_event = wire::Event {
            metric_f: Some(1.5),
            metric_d: Some(2.5),
            metric_sint64: Some(3),
            ..Default::default()
        };
        assert_eq!(Event::from(wire_event).metric(), Some(1.5));

        let wire_event = wire::Event {
            metric_sint64: Some(7),
            ..Default::default()
        };
        assert_eq!(Event::from(wire_event).metric(), Some(7.0));
    }

    #[test]
    fn test_decode_time_micros() {
        let wire_event = wire::Event {
            time_micros: Some(1_700_000_000_250_000),
            ..Default::default()
        };
        assert_eq!(Event::from(wire_event).time(), Some(1_700_000_000));
    }
}
