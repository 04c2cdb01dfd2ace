pub mod delete_shipment_command;
pub mod reconcile_shipment_command;

pub use delete_shipment_command::DeleteShipmentCommand;
pub use reconcile_shipment_command::{ReconcileOutcome, ReconcileShipmentCommand};
