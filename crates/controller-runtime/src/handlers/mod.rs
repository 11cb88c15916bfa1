//! # Inbound Envelope Handlers
//!
//! Dispatches verified envelopes to the right C4/C5/C6 coordinator call by
//! `message_type`, and signs/sends whatever follow-up envelope that call
//! produces. Grounded on `node-runtime::handlers::choreography`'s
//! event-type-to-handler-function dispatch table, generalized from an
//! in-process event bus subscription per handler to one `match` over
//! `pdsno_types::catalog::MessageType` since every PDSNO message already
//! carries an explicit type rather than being inferred from the topic it
//! arrived on.

pub mod inbound;
pub mod messages;

pub use inbound::InboundHandler;
