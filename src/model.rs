use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace};

use crate::domain::{MdvConfig, MdvError, Message, ViewOptions};
use crate::inputter::{InputResult, Inputter};
use crate::pipeline::{self, Projection, SortSpec};
use crate::record::{self, RecordSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Upload,
    Loading,
    Table,
}

#[derive(Debug, PartialEq)]
pub enum Status {
    Running,
    Quitting,
}

/// The deferred install of a freshly parsed record set. A plain deadline
/// today, but shaped as a cancellable task so real asynchronous parsing
/// could replace it without touching the screen transitions.
struct LoadingTask {
    file_name: String,
    records: RecordSet,
    deadline: Instant,
}

impl LoadingTask {
    fn new(file_name: String, records: RecordSet, delay: Duration) -> Self {
        LoadingTask {
            file_name,
            records,
            deadline: Instant::now() + delay,
        }
    }

    fn ready(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn cancel(self) {
        debug!("Canceled pending load of {}", self.file_name);
    }
}

/// Owns every piece of session state: the current screen, the active
/// record set and file name, and the table view state (search, sort,
/// page, selected column). Updated through `Message`s, projected by the
/// UI on each draw.
pub struct Model {
    config: MdvConfig,
    pub status: Status,
    screen: Screen,
    records: RecordSet,
    sample: RecordSet,
    file_name: String,
    pending: Option<LoadingTask>,
    upload_error: Option<String>,
    input: Inputter,
    search_active: bool,
    search_term: String,
    sort: SortSpec,
    page: usize,
    selected_column: usize,
    status_message: String,
    export_dir: PathBuf,
}

impl Model {
    pub fn new(config: MdvConfig) -> Self {
        Model {
            config,
            status: Status::Running,
            screen: Screen::Upload,
            records: RecordSet::default(),
            sample: record::sample_records(),
            file_name: String::new(),
            pending: None,
            upload_error: None,
            input: Inputter::default(),
            search_active: false,
            search_term: String::new(),
            sort: SortSpec::default(),
            page: 1,
            selected_column: 0,
            status_message: String::new(),
            export_dir: PathBuf::from("."),
        }
    }

    // ------------------------- projections for the UI ------------------------

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn view_options(&self) -> ViewOptions {
        self.config.view
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn input_state(&self) -> InputResult {
        self.input.get()
    }

    pub fn search_active(&self) -> bool {
        self.search_active
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    /// The record set the table screen works on. An empty set projects
    /// the built-in demonstration data instead of an empty table.
    pub fn display_records(&self) -> &RecordSet {
        if self.records.is_empty() {
            &self.sample
        } else {
            &self.records
        }
    }

    /// Recompute the filtered/sorted/paged view. Pure in the model state.
    pub fn table_view(&self) -> Projection {
        pipeline::project(
            self.display_records(),
            &self.search_term,
            &self.sort,
            self.page,
            self.config.view,
        )
    }

    // ------------------------------ transitions ------------------------------

    /// Advance the loading deadline. Called once per event-loop iteration.
    pub fn tick(&mut self) {
        if self.screen == Screen::Loading
            && self.pending.as_ref().is_some_and(LoadingTask::ready)
        {
            let task = self.pending.take().unwrap();
            info!(
                "Loaded \"{}\": {} records",
                task.file_name,
                task.records.len()
            );
            self.install_records(task.file_name, task.records);
        }
    }

    pub fn update(&mut self, message: Message) -> Result<(), MdvError> {
        trace!("Update: {:?} on {:?}", message, self.screen);
        match self.screen {
            Screen::Upload => match message {
                Message::Quit => self.quit(),
                Message::RawKey(key) => self.read_path_input(key),
                _ => (),
            },
            Screen::Loading => {
                if let Message::Quit = message {
                    if let Some(task) = self.pending.take() {
                        task.cancel();
                    }
                    self.quit();
                }
            }
            Screen::Table => match message {
                Message::Quit => self.quit(),
                Message::RawKey(key) => self.read_search_input(key),
                Message::MoveLeft => self.move_column(-1),
                Message::MoveRight => self.move_column(1),
                Message::ToggleSort => self.toggle_sort(),
                Message::NextPage => self.flip_page(1),
                Message::PrevPage => self.flip_page(-1),
                Message::Search => self.open_search(),
                Message::ExportCsv => self.export_csv(),
                Message::NewUpload => self.request_new_upload(),
            },
        }
        Ok(())
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    /// Whether key events should be forwarded verbatim to a line editor
    /// instead of being mapped to commands.
    pub fn raw_keyevents(&self) -> bool {
        self.screen == Screen::Upload || (self.screen == Screen::Table && self.search_active)
    }

    /// Validate and parse a CSV file. On success the records are handed to
    /// the loading screen; on failure an inline error is set and the
    /// upload screen stays.
    pub fn accept_file(&mut self, raw_path: &str) {
        let path = match shellexpand::full(raw_path) {
            Ok(p) => PathBuf::from(p.as_ref()),
            Err(_) => PathBuf::from(raw_path),
        };
        // extension gate first, before touching the filesystem
        if !record::has_csv_extension(&path.to_string_lossy()) {
            self.set_upload_error(MdvError::InvalidExtension);
            return;
        }
        match RecordSet::load_csv(&path) {
            Ok(records) => {
                self.upload_error = None;
                let file_name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| raw_path.to_string());
                self.submit_upload(file_name, records);
            }
            Err(e) => self.set_upload_error(e),
        }
    }

    fn set_upload_error(&mut self, error: MdvError) {
        debug!("Upload rejected: {:?}", error);
        self.upload_error = Some(error.user_message());
    }

    /// Hand a parsed record set to the loading screen. The records become
    /// visible once the processing deadline elapses; the deadline cannot
    /// be interrupted except by quitting.
    pub fn submit_upload(&mut self, file_name: String, records: RecordSet) {
        let delay = Duration::from_millis(self.config.loading_delay_ms);
        self.file_name = file_name.clone();
        self.pending = Some(LoadingTask::new(file_name, records, delay));
        self.screen = Screen::Loading;
    }

    fn install_records(&mut self, file_name: String, records: RecordSet) {
        self.records = records;
        self.file_name = file_name;
        self.sort.reset();
        self.search_term.clear();
        self.page = 1;
        self.selected_column = 0;
        self.search_active = false;
        self.status_message.clear();
        self.screen = Screen::Table;
    }

    /// Back to the upload screen; the uploaded record set is discarded.
    fn request_new_upload(&mut self) {
        self.records = RecordSet::default();
        self.file_name.clear();
        self.sort.reset();
        self.search_term.clear();
        self.page = 1;
        self.selected_column = 0;
        self.search_active = false;
        self.status_message.clear();
        self.upload_error = None;
        self.input.clear();
        self.screen = Screen::Upload;
    }

    // --------------------------- table interaction ---------------------------

    fn move_column(&mut self, step: isize) {
        let ncols = self.display_records().headers().len();
        if ncols == 0 {
            return;
        }
        let col = self.selected_column as isize + step;
        self.selected_column = col.clamp(0, ncols as isize - 1) as usize;
    }

    fn toggle_sort(&mut self) {
        let Some(header) = self
            .display_records()
            .headers()
            .get(self.selected_column)
            .cloned()
        else {
            return;
        };
        self.sort.toggle(&header);
        debug!("Sort spec: {:?}", self.sort);
    }

    fn flip_page(&mut self, step: isize) {
        if !self.config.view.pagination {
            return;
        }
        let page_count = self.table_view().page_count;
        let page = self.page as isize + step;
        self.page = page.clamp(1, page_count as isize) as usize;
    }

    fn open_search(&mut self) {
        if !self.config.view.search {
            return;
        }
        self.search_active = true;
        self.input.clear();
        self.input.set(&self.search_term);
    }

    /// Search input is live: every edit refilters and snaps back to the
    /// first page.
    fn read_search_input(&mut self, key: KeyEvent) {
        if !self.search_active {
            return;
        }
        let result = self.input.read(key);
        if result.input != self.search_term {
            self.search_term = result.input.clone();
            self.page = 1;
        }
        if result.finished {
            self.search_active = false;
            if result.canceled {
                self.search_term.clear();
                self.page = 1;
            }
        }
    }

    fn read_path_input(&mut self, key: KeyEvent) {
        let result = self.input.read(key);
        if result.finished {
            self.input.clear();
            if result.canceled {
                self.upload_error = None;
            } else if !result.input.is_empty() {
                self.accept_file(&result.input);
            }
        }
    }

    fn export_csv(&mut self) {
        let projection = self.table_view();
        let view = pipeline::viewed_records(self.display_records(), &projection);
        // no error path on the table screen, failures land in the footer
        self.status_message = match view.export(&self.export_dir) {
            Ok(path) => format!("Exported {} rows to {}", view.len(), path.display()),
            Err(e) => format!("Export failed: {}", e.user_message()),
        };
    }

    #[cfg(test)]
    pub fn set_export_dir(&mut self, dir: &std::path::Path) {
        self.export_dir = dir.to_path_buf();
    }
}
