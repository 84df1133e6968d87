pub mod handlers;
pub mod telegram;
