//! Order-side logic: Shopify webhook authentication, fraud scoring and the order log.

pub mod fraud;
pub mod orders;
pub mod shopify;
