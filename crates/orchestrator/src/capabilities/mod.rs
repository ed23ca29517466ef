//! Built-in capabilities.

pub mod customer_data;
pub mod documents;
pub mod research;

pub use customer_data::{QueryCustomerData, QUERY_CUSTOMER_DATA};
pub use documents::{SearchDocuments, SEARCH_DOCUMENTS};
pub use research::{WebResearch, WEB_RESEARCH};
