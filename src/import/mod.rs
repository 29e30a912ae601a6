//! Spreadsheet import: sources, header mapping, value normalization and
//! the deduplicating importer.

pub mod broker;
pub mod cell;
pub mod columns;
mod dto;
pub mod graph;
pub mod handlers;
pub mod importer;
pub mod legacy;
pub mod services;
pub mod source;
pub mod store;
pub mod values;
pub mod workbook;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
