//! Inkpatch Core Library
//!
//! Edit sessions, color sampling, font resolution and the reconciliation
//! engine that turns an edit ledger into a new PDF.

pub mod config;
pub mod error;
pub mod font_resolver;
pub mod reconcile;
pub mod sampler;
pub mod script;
pub mod session;

pub use config::{ConfigError, ExportConfig};
pub use error::{FetchError, ReconcileError, SessionError};
pub use font_resolver::{
    standard_font, web_font, FontDescriptor, FontFetcher, FontResolver, UreqFontFetcher, WebFont, WEB_FONTS,
};
pub use reconcile::{ExportReport, ReconciledDocument, Reconciler};
pub use sampler::RasterView;
pub use script::{EditScript, ScriptEdit, ScriptStroke, ScriptSummary};
pub use session::{export_file_name, EditSession, ExportedDocument, EXPORT_PREFIX};
