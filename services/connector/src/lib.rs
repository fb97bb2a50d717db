//! Category sync between the local catalog and remote shop backends.

pub mod batch;
pub mod importer;
pub mod jobs;
pub mod magento;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod test_support;
