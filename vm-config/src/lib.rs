//! Configuration for the guest VM provider.
//!
//! [`ProviderConfig`] is built once from the host's initialize request,
//! optionally tuned by `<base_path>/provider.yaml`, and then only read.

pub mod config;
pub mod paths;
pub mod request;
pub mod retry;

pub use config::{GuestSettings, PortSettings, ProviderConfig, ProviderTuning, TimingSettings};
pub use request::InitializeProviderRequest;
pub use retry::{RetryPolicy, RetrySettings};
