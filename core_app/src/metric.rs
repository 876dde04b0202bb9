use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("pet_sponsor_statds")
        .with_description("Pet sponsor app statistics")
        .with_unit("attempt")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_sponsorship_action_statds(action: &str) {
    incr_statds("sponsorship_action".to_string(), action.into())
}

pub fn incr_walk_action_statds(action: &str) {
    incr_statds("walk_action".to_string(), action.into())
}
