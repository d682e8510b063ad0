//! Alert rendering: template, filters and HTML sanitization.

mod error;
mod formatter;
mod sanitize;
pub mod template;

pub use error::FormatError;
pub use formatter::{DEFAULT_TEMPLATE, Notification, NotificationFormatter};
pub use sanitize::{escape_html, sanitize_html};
