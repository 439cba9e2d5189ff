pub mod account;
pub mod leaderboard;
pub mod question;
pub mod session;
pub mod validate;
