pub mod due_order;
pub mod order;
pub mod order_item;
pub mod shipment;
