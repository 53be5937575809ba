//! Browser client assets.
//!
//! Assets are embedded at compile time using `include_str!`.

/// The single-page client: task form, filters, list and insights panel.
pub const INDEX_TEMPLATE: &str = include_str!("templates/index.html");

/// Client logic talking to the task API.
pub const APP_SCRIPT: &str = include_str!("templates/app.js");
