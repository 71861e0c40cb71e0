//! 浏览器接入模块
//!
//! 两种接入方式：连接已有实例（调试端口）或启动无头浏览器。

pub mod connection;
pub mod headless;

pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;
