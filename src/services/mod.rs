// Core services
pub mod orders;
pub mod shipments;

// Per-order serialisation shared by the services above
pub mod order_locks;
