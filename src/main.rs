use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod pipeline;
mod record;
mod ui;

use controller::Controller;
use domain::{MdvConfig, MdvError, ViewOptions};
use model::{Model, Status};
use ui::TableUI;

/// A tui based medical data viewer: load a CSV of patient records and
/// browse it in a sortable, searchable, paginated table.
#[derive(Parser)]
#[command(name = "mdv", version, about)]
struct Cli {
    /// CSV file to load on startup
    file: Option<PathBuf>,

    /// Plain table variant: first ten rows only, no search or pagination
    #[arg(long)]
    basic: bool,

    /// Hide the footer line (search box and status message)
    #[arg(long)]
    no_footer: bool,

    /// Visual processing delay before the table appears, in milliseconds
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,

    /// Append tracing output to this file (stdout belongs to the tui);
    /// filtered through the MDV_LOG environment variable
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), MdvError> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    let view = if cli.basic {
        ViewOptions::plain()
    } else {
        ViewOptions::default().footer(!cli.no_footer)
    };
    let cfg = MdvConfig::default()
        .loading_delay_ms(cli.delay_ms)
        .view(view);

    let mut model = Model::new(cfg.clone());
    if let Some(file) = &cli.file {
        model.accept_file(&file.to_string_lossy());
    }

    let mut ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);
    let mut terminal = ratatui::init();

    while model.status != Status::Quitting {
        terminal.draw(|f| ui.draw(&model, f))?;
        model.tick();
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&PathBuf>) -> Result<(), MdvError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::from_env("MDV_LOG"))
        .with(tracing_subscriber::fmt::layer().with_writer(Arc::new(file)))
        .with(ErrorLayer::default())
        .try_init()
        .ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use crate::model::Screen;
    use crate::pipeline::SortSpec;
    use crate::record::RecordSet;
    use ratatui::crossterm::event::{KeyCode, KeyEvent};
    use std::time::Duration;

    const FIXTURE: &str = "tests/fixtures/patients_12.csv";

    #[test]
    fn upload_scenario_end_to_end() {
        let cfg = MdvConfig::default().loading_delay_ms(50);
        let mut model = Model::new(cfg);
        model.accept_file(FIXTURE);
        assert_eq!(model.screen(), Screen::Loading);
        assert_eq!(model.file_name(), "patients_12.csv");

        model.tick();
        assert_eq!(model.screen(), Screen::Loading);
        std::thread::sleep(Duration::from_millis(80));
        model.tick();
        assert_eq!(model.screen(), Screen::Table);

        // 12 rows split into page 1 of 2 (10 + 2)
        let view = model.table_view();
        assert_eq!(view.page, 1);
        assert_eq!(view.page_count, 2);
        assert_eq!(view.page_rows.len(), 10);
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.table_view().page_rows.len(), 2);

        // a search matching 3 rows resets to page 1 of 1
        model.update(Message::Search).unwrap();
        for c in "critical".chars() {
            model
                .update(Message::RawKey(KeyEvent::from(KeyCode::Char(c))))
                .unwrap();
        }
        let view = model.table_view();
        assert_eq!(view.page, 1);
        assert_eq!(view.page_count, 1);
        assert_eq!(view.ordered.len(), 3);

        // cancel returns to upload with the uploaded data discarded
        model
            .update(Message::RawKey(KeyEvent::from(KeyCode::Enter)))
            .unwrap();
        model.update(Message::NewUpload).unwrap();
        assert_eq!(model.screen(), Screen::Upload);
        assert!(model.file_name().is_empty());
    }

    #[test]
    fn export_reparses_to_the_exported_view() {
        let dir = tempfile::tempdir().unwrap();
        let set = RecordSet::load_csv(std::path::Path::new(FIXTURE)).unwrap();
        assert_eq!(set.len(), 12);

        let mut sort = SortSpec::default();
        sort.toggle("Name");
        let projection = pipeline::project(&set, "stable", &sort, 1, ViewOptions::default());
        let view = pipeline::viewed_records(&set, &projection);
        let path = view.export(dir.path()).unwrap();

        let reparsed = RecordSet::load_csv(&path).unwrap();
        assert_eq!(reparsed, view);
    }
}
