// Presentation layer - View sinks
pub mod console_view;
