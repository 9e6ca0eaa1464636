//! # Pluggable monitoring sink.
//!
//! The runtime reports two kinds of signals:
//! - counters (`incr`/`decr` by string id) for live cell gauges, and
//! - measuring spans around each event a behavior processes.
//!
//! [`NullMonitoring`] is the default sink and discards everything; plug a
//! real implementation via
//! [`Environment::set_monitoring`](crate::Environment::set_monitoring) or the
//! [`EnvironmentBuilder`](crate::EnvironmentBuilder).

/// A running measurement, ended explicitly by the runtime.
///
/// Dropping a span without calling [`end_measuring`](Measuring::end_measuring)
/// abandons the measurement; the runtime does this when event processing
/// fails.
pub trait Measuring: Send {
    /// Completes the measurement.
    fn end_measuring(self: Box<Self>);
}

/// Counter and timing sink for the runtime.
///
/// Ids follow the form `cells/<envID>/cell/<behaviorTypeIdent>` for per-cell
/// signals and `cells/<envID>/total-cells` for the environment gauge.
pub trait Monitoring: Send + Sync + 'static {
    /// Increments the counter with the given id.
    fn incr(&self, id: &str);

    /// Decrements the counter with the given id.
    fn decr(&self, id: &str);

    /// Begins a measuring span for the given id.
    fn begin_measuring(&self, id: &str) -> Box<dyn Measuring>;
}

/// Monitoring sink that discards all signals (the default).
pub struct NullMonitoring;

impl Monitoring for NullMonitoring {
    fn incr(&self, _id: &str) {}

    fn decr(&self, _id: &str) {}

    fn begin_measuring(&self, _id: &str) -> Box<dyn Measuring> {
        Box::new(NullMeasuring)
    }
}

struct NullMeasuring;

impl Measuring for NullMeasuring {
    fn end_measuring(self: Box<Self>) {}
}
