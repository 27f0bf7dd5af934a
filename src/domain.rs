use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

// Everything that can go wrong in mdv. Upload-time failures (extension,
// structure, read) are rendered inline on the upload screen; the rest
// abort the session.
#[derive(Debug)]
pub enum MdvError {
    IoError(Error),
    PolarsError(PolarsError),
    InvalidExtension,
    ParseStructureError(String),
    ReadFailure(String),
}

impl MdvError {
    /// The message shown next to the upload prompt.
    pub fn user_message(&self) -> String {
        match self {
            MdvError::InvalidExtension => "Please upload a CSV file only".to_string(),
            MdvError::ParseStructureError(_) => "Error parsing CSV file".to_string(),
            MdvError::ReadFailure(_) => "Failed to read the file".to_string(),
            MdvError::IoError(e) => format!("I/O error: {e}"),
            MdvError::PolarsError(e) => format!("Data error: {e}"),
        }
    }
}

impl From<Error> for MdvError {
    fn from(err: Error) -> Self {
        MdvError::IoError(err)
    }
}

impl From<PolarsError> for MdvError {
    fn from(err: PolarsError) -> Self {
        MdvError::PolarsError(err)
    }
}

/// Feature switches for the table screen. The plain variant (no search,
/// no pagination, no footer) always shows the first ten rows but keeps
/// the columns sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Setters)]
pub struct ViewOptions {
    pub pagination: bool,
    pub search: bool,
    pub footer: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        ViewOptions {
            pagination: true,
            search: true,
            footer: true,
        }
    }
}

impl ViewOptions {
    pub fn plain() -> Self {
        ViewOptions {
            pagination: false,
            search: false,
            footer: false,
        }
    }
}

#[derive(Debug, Clone, Setters)]
pub struct MdvConfig {
    /// Event poll timeout in milliseconds. Doubles as the tick interval
    /// that drives the loading deadline.
    pub event_poll_time: u64,
    /// Visual processing delay between accepting a file and showing the
    /// table, in milliseconds.
    pub loading_delay_ms: u64,
    pub view: ViewOptions,
}

impl Default for MdvConfig {
    fn default() -> Self {
        MdvConfig {
            event_poll_time: 100,
            loading_delay_ms: 2000,
            view: ViewOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    /// Key forwarded verbatim to the active line editor (path or search).
    RawKey(KeyEvent),
    /// Column selection on the table screen.
    MoveLeft,
    MoveRight,
    /// Toggle the sort spec on the selected column.
    ToggleSort,
    NextPage,
    PrevPage,
    /// Open the search box.
    Search,
    ExportCsv,
    /// Discard the current record set and return to the upload screen.
    NewUpload,
}

pub const UPLOAD_HINT: &str = "\
Sample data format:
Patient_ID, Name, Age, Gender, Blood_Pressure, Heart_Rate, Temperature
P001, John Doe, 45, M, 135, 72, 98.6";

pub const TABLE_KEYS: &str =
    " \u{2190}/\u{2192} column | Enter sort | / search | [ ] page | e export | n new upload | q quit ";
