//! ThresholdFE: interactive and headless image thresholding.

#[macro_use]
pub mod logger;
#[macro_use]
pub mod i18n;
pub mod app;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod settings;
