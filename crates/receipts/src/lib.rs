//! Receipt records: evidence of goods or services actually received
//! against a purchase order.

pub mod receipt;
pub mod repository;

pub use receipt::{check_over_delivery, Receipt, ReceiptLineItem};
pub use repository::ReceiptRepository;
