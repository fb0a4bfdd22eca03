pub mod card;
pub mod context;
pub mod decision;
pub mod message;
pub mod records;
