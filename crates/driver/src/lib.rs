//! UI automation for the remote Flow tool.
//!
//! [`session::WebDriverSession`] implements [`flowgen_core::driver::UiDriver`]
//! on top of a W3C WebDriver endpoint (chromedriver in practice) through the
//! thin [`webdriver::WebDriverClient`]. Selector strings live in
//! [`selectors`], credential handling in [`cookies`], and [`scripted`] holds
//! the in-memory driver the pipeline and API test suites run against.

pub mod cookies;
pub mod scripted;
pub mod selectors;
pub mod session;
pub mod webdriver;

pub use session::{WebDriverConfig, WebDriverFactory, WebDriverSession};
