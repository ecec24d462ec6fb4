use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("gustobot.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("gustobot.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("gustobot.client.request_duration_seconds");
pub(crate) static CLIENT_UPLOADS: Counter = Counter::new("gustobot.client.uploads");
pub(crate) static CLIENT_UPLOAD_BYTES: Counter = Counter::new("gustobot.client.upload_bytes");

pub(crate) static STREAM_OPENED: Counter = Counter::new("gustobot.stream.opened");
pub(crate) static STREAM_EVENTS: Counter = Counter::new("gustobot.stream.events");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("gustobot.stream.malformed");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("gustobot.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("gustobot.stream.bytes");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("gustobot.stream.cancelled");

pub(crate) static SESSION_EXCHANGES: Counter = Counter::new("gustobot.session.exchanges");
pub(crate) static SESSION_FALLBACKS: Counter = Counter::new("gustobot.session.fallbacks");
pub(crate) static SESSION_IGNORED: Counter = Counter::new("gustobot.session.ignored_inputs");
pub(crate) static SESSION_EXCHANGE_DURATION: Moments =
    Moments::new("gustobot.session.exchange_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_counter(&CLIENT_UPLOADS);
    collector.register_counter(&CLIENT_UPLOAD_BYTES);

    collector.register_counter(&STREAM_OPENED);
    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_CANCELLED);

    collector.register_counter(&SESSION_EXCHANGES);
    collector.register_counter(&SESSION_FALLBACKS);
    collector.register_counter(&SESSION_IGNORED);
    collector.register_moments(&SESSION_EXCHANGE_DURATION);
}
