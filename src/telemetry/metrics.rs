use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("crypto-market-tracker"));

// --- Tracker Metrics ---

pub static TRACKER_CYCLES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("tracker.cycles")
        .with_description("Regeneration cycles run, labelled by outcome")
        .with_unit("{cycle}")
        .build()
});

pub static TRACKER_CYCLE_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("tracker.cycle.duration")
        .with_description("Fetch, render and write duration of one cycle in seconds")
        .with_unit("s")
        .build()
});

pub static TRACKER_SNAPSHOT_RECORDS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("tracker.snapshot.records")
        .with_description("Number of market records in a published snapshot")
        .with_unit("{record}")
        .build()
});

// --- HTTP Metrics ---

pub static HTTP_REQUESTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("http.requests.total")
        .with_description("Total number of HTTP requests")
        .with_unit("{request}")
        .build()
});

pub static HTTP_REQUEST_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("http.request.duration")
        .with_description("HTTP request duration in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ])
        .build()
});
