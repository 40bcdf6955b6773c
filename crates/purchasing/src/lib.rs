//! Purchase order master data: the ordered side of every match candidate.

pub mod purchase_order;
pub mod repository;

pub use purchase_order::{PoLineItem, PurchaseOrder, PurchaseOrderStatus};
pub use repository::PurchaseOrderRepository;
