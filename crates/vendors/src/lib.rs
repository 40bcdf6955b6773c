//! Vendor master data: the supplier side of every match candidate.

pub mod repository;
pub mod vendor;

pub use repository::VendorRepository;
pub use vendor::{normalize_name, Vendor, VendorStatus};
