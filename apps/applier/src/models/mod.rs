pub mod message;
pub mod posting;
