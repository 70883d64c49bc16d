pub mod public;
pub mod response;
