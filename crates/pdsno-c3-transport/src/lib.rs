//! # C3 — Transport Fabric
//!
//! Three delivery tiers behind one `Envelope` wire format (spec §5): an
//! in-process bus, point-to-point HTTP, and topic pub/sub, selected per
//! message type by a static policy table with a documented fallback.

pub mod bus_transport;
pub mod errors;
pub mod http;
pub mod policy;
pub mod pubsub;
pub mod router;
pub mod transport;

pub use bus_transport::BusTransport;
pub use errors::TransportError;
pub use http::{EnvelopeSink, HttpClientConfig, HttpTransport, SinkOutcome};
pub use policy::{preferred_transport, TransportKind};
pub use pubsub::InMemoryBroker;
pub use router::TransportRouter;
pub use transport::UnicastTransport;
