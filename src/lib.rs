//! Cadastro: spreadsheet import for engineering cadastres
//!
//! Reads filled templates (welds, valves, cables, drawings, equipment,
//! luminaires), validates every row against the reference tables and the
//! keys already stored, previews the outcome, and commits the accepted rows
//! in ordered chunks.

pub mod cli;
pub mod core;
pub mod entities;
pub mod import;
