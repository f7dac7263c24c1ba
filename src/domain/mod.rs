// Challenge evaluation domain
pub mod challenge;

// Outbound/inbound domain events
pub mod events;

// Risk scoring domain
pub mod risk;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
