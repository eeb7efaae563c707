//! End-to-end pipeline tests against in-memory gateways.

mod fake_api;
mod pipeline;
