//! Driver families.

pub mod chromedriver;
pub mod mswebdriver;

pub use chromedriver::ChromeDriver;
pub use mswebdriver::MsWebDriver;
