pub mod hooks;
pub mod output;
