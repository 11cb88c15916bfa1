//! # Subsystem Container
//!
//! Holds every C1-C6 instance this process needs for its configured tier,
//! wired together and ready to drive. Grounded on
//! `node-runtime::container::subsystems::SubsystemContainer`'s
//! dependency-ordered, `Arc`-held instance holder.

pub mod subsystems;

pub use subsystems::ControllerContainer;
