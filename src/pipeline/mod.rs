pub mod text;
pub mod retrieval;
pub mod extraction;
pub mod assessment;
pub mod decision;
pub mod consistency;
pub mod events;
pub mod cancel;
pub mod processor;
