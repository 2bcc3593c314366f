pub mod hash;
pub mod link;
