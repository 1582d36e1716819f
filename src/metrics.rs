//! Prometheus metrics for the agent loop
//!
//! All metrics live in the default registry so `render()` can dump them in
//! the text exposition format (shown by the `/metrics` shell command, and
//! scrapeable by a sidecar when running as a Kubernetes job).

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Finished agent tasks by outcome (answer, exhausted, transport_error)
    pub static ref AGENT_TASKS: IntCounterVec = register_int_counter_vec!(
        "harness_agent_tasks_total",
        "Agent tasks by outcome",
        &["outcome"]
    )
    .expect("metric can be registered");

    /// Completion rounds per task
    pub static ref AGENT_ROUNDS: Histogram = register_histogram!(
        "harness_agent_rounds",
        "Completion rounds per agent task",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 50.0]
    )
    .expect("metric can be registered");

    /// Tool dispatches by tool name and status (ok, error, unknown)
    pub static ref AGENT_TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "harness_tool_calls_total",
        "Tool calls by tool and status",
        &["tool", "status"]
    )
    .expect("metric can be registered");

    /// Latency of a single completion request
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "harness_llm_call_seconds",
        "Completion request latency in seconds",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("metric can be registered");
}

/// Text exposition of every registered metric
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
