//! Tracing subscriber setup. A plain `EnvFilter` built from `log_level`,
//! rendered with [`log_format::TextWithSpanIds`] so log lines carry
//! `trace_id`/`span_id` when emitted inside a request span.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::log_format::TextWithSpanIds;

pub fn init(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(log_level).or_else(|_| EnvFilter::try_new("info"))?;
    let fmt_layer = tracing_subscriber::fmt::layer().event_format(TextWithSpanIds::new());
    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
