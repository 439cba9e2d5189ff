pub mod filter;
pub mod identity;
pub mod question;
pub mod scoring;
