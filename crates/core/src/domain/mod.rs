pub mod connection;
pub mod email;
pub mod partner;
pub mod quote;
