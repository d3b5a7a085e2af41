// Application layer - Core components and the services built on them
pub mod backend;
pub mod clock;
pub mod command_service;
pub mod connectivity;
pub mod historical_cache;
pub mod last_seen;
pub mod live_chart;
pub mod poll_task;
pub mod render_mode;
pub mod sample_buffer;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
