pub mod server;

pub use server::{ConfigSink, CookieServiceImpl};
