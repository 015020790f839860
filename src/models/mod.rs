pub(crate) mod workbook;

pub use workbook::{Filename, Workbook, WorkbookId, XLSX_MIME_TYPE};
