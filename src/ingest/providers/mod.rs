pub mod newsapi;
pub mod newsdata;
