pub mod report_writer;
pub mod text_loader;

pub use report_writer::ReportWriter;
pub use text_loader::{normalize_text, TextLoader};
