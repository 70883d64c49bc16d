pub mod catalog_helpers;
pub mod commerce_helpers;
pub mod public_helpers;
