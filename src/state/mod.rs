/// State management module
///
/// This module handles all persisted application state:
/// - The card record types (data.rs)
/// - The SQLite card history and its change notifications (history.rs)

pub mod data;
pub mod history;
