//! Wire types exchanged over the out-of-band control plane.
//!
//! The control channel itself (HTTP/JSON in deployments) lives outside this
//! workspace; these are the request/response and descriptor payloads both
//! sides agree on: queue-pair identities for the handshake, memory-region
//! descriptors for one-sided reads, page geometry (control info) the
//! collector needs to slice raw bytes back into pages, and the metric
//! registration pair used by producers.

pub mod control;
pub mod descriptor;
pub mod registration;

pub use control::{ControlInfo, PageControl, PageGeometry};
pub use descriptor::{QueuePairDescriptor, RegionDescriptor};
pub use registration::{MetricLocation, MetricRegistration};
