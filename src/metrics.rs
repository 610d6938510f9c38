use prometheus::{
    Counter, Histogram, IntGauge, Registry, Opts, HistogramOpts,
    register_counter_with_registry, register_histogram_with_registry,
    register_int_gauge_with_registry, Encoder, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use crate::{BoxOfficeError, ErrorKind, Result};

/// Metrics collector for the box office
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    started_at: Instant,

    // Business metrics
    pub orders_created: Counter,
    pub payments_confirmed: Counter,
    pub seat_conflicts: Counter,
    pub seats_sold: Counter,
    pub check_ins: Counter,
    pub refunds: Counter,
    pub refund_amount: Counter,
    pub cancellations: Counter,

    // Service metrics
    pub service_uptime: IntGauge,
    pub request_duration: Histogram,
    pub error_rate: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let orders_created = register_counter_with_registry!(
            Opts::new("orders_created_total", "Total number of orders created"),
            registry
        )?;

        let payments_confirmed = register_counter_with_registry!(
            Opts::new("payments_confirmed_total", "Total number of orders paid"),
            registry
        )?;

        let seat_conflicts = register_counter_with_registry!(
            Opts::new("seat_conflicts_total", "Checkouts that lost a seat to another buyer"),
            registry
        )?;

        let seats_sold = register_counter_with_registry!(
            Opts::new("seats_sold_total", "Total number of seats sold"),
            registry
        )?;

        let check_ins = register_counter_with_registry!(
            Opts::new("check_ins_total", "Total number of orders checked in"),
            registry
        )?;

        let refunds = register_counter_with_registry!(
            Opts::new("refunds_total", "Total number of refunded orders"),
            registry
        )?;

        let refund_amount = register_counter_with_registry!(
            Opts::new("refund_amount_total", "Sum of refunded amounts"),
            registry
        )?;

        let cancellations = register_counter_with_registry!(
            Opts::new("cancellations_total", "Total number of cancelled orders"),
            registry
        )?;

        let service_uptime = register_int_gauge_with_registry!(
            Opts::new("service_uptime_seconds", "Service uptime in seconds"),
            registry
        )?;

        let request_duration = register_histogram_with_registry!(
            HistogramOpts::new("request_duration_seconds", "Time spent processing requests")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            registry
        )?;

        let error_rate = register_counter_with_registry!(
            Opts::new("errors_total", "Total number of failed requests"),
            registry
        )?;

        Ok(Self {
            registry,
            started_at: Instant::now(),
            orders_created,
            payments_confirmed,
            seat_conflicts,
            seats_sold,
            check_ins,
            refunds,
            refund_amount,
            cancellations,
            service_uptime,
            request_duration,
            error_rate,
        })
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        self.service_uptime
            .set(self.started_at.elapsed().as_secs() as i64);

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| BoxOfficeError::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_payment(&self, outcome: std::result::Result<usize, &BoxOfficeError>) {
        match outcome {
            Ok(seats) => {
                self.payments_confirmed.inc();
                self.seats_sold.inc_by(seats as f64);
            }
            Err(e) => self.record_failure(e),
        }
    }

    /// Counts lost seat races separately from other failures.
    pub fn record_failure(&self, error: &BoxOfficeError) {
        if matches!(error, BoxOfficeError::SeatUnavailable { .. }) {
            self.seat_conflicts.inc();
        }
    }

    pub fn record_check_in(&self) {
        self.check_ins.inc();
    }

    pub fn record_refund(&self, amount: i64) {
        self.refunds.inc();
        self.refund_amount.inc_by(amount.max(0) as f64);
    }

    pub fn record_cancellation(&self) {
        self.cancellations.inc();
    }

    pub fn record_request(&self, duration: std::time::Duration, success: bool) {
        self.request_duration.observe(duration.as_secs_f64());
        if !success {
            self.error_rate.inc();
        }
    }
}

/// Whether a failure should count against the service rather than the caller.
pub fn is_server_fault(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TransientIo | ErrorKind::Internal)
}
