use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Paragraph, Row, Table},
};

use crate::domain::{MdvConfig, TABLE_KEYS, UPLOAD_HINT};
use crate::model::{Model, Screen};
use crate::pipeline::{self, Projection, SortDirection};

const MAX_COLUMN_WIDTH: u16 = 24;
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct TableUI {
    show_footer: bool,
    spinner_idx: usize,
}

impl TableUI {
    pub fn new(cfg: &MdvConfig) -> Self {
        TableUI {
            show_footer: cfg.view.footer,
            spinner_idx: 0,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let title = Line::from(" Medical Data Dashboard ".bold());
        let instructions = match model.screen() {
            Screen::Upload => Line::from(vec![
                " Enter ".into(),
                "accept".blue().bold(),
                "  Esc ".into(),
                "clear".blue().bold(),
                "  Ctrl+C ".into(),
                "quit ".blue().bold(),
            ]),
            Screen::Loading => Line::from(" q quit ".blue().bold()),
            Screen::Table => Line::from(TABLE_KEYS.blue().bold()),
        };
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);
        let inner = block.inner(frame.area());
        frame.render_widget(block, frame.area());

        match model.screen() {
            Screen::Upload => self.draw_upload(model, frame, inner),
            Screen::Loading => self.draw_loading(model, frame, inner),
            Screen::Table => self.draw_table(model, frame, inner),
        }
    }

    fn draw_upload(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let input = model.input_state();
        let mut lines = vec![
            Line::from("Upload Medical Data".bold()),
            Line::from("Enter the path of a CSV file with patient records:"),
            Line::from(""),
            Self::input_line("> ", &input),
            Line::from(""),
        ];
        if let Some(error) = model.upload_error() {
            lines.push(Line::from(error.to_string().red().bold()));
            lines.push(Line::from(""));
        }
        for hint in UPLOAD_HINT.lines() {
            lines.push(Line::from(hint.dark_gray()));
        }
        frame.render_widget(Paragraph::new(Text::from(lines)).centered(), area);
    }

    fn draw_loading(&mut self, model: &Model, frame: &mut Frame, area: Rect) {
        self.spinner_idx = (self.spinner_idx + 1) % SPINNER.len();
        let lines = vec![
            Line::from(""),
            Line::from(SPINNER[self.spinner_idx].to_string().blue().bold()),
            Line::from("Processing Medical Data...".bold()),
            Line::from(format!("Analyzing: {}", model.file_name())),
            Line::from(""),
            Line::from("Parsing CSV structure...".dark_gray()),
            Line::from("Preparing dashboard view...".dark_gray()),
        ];
        frame.render_widget(Paragraph::new(Text::from(lines)).centered(), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let view = model.table_view();
        let [head_area, table_area, foot_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(if self.show_footer { 2 } else { 0 }),
        ])
        .areas(area);

        frame.render_widget(self.heading(model, &view), head_area);
        self.render_records(model, &view, frame, table_area);
        if self.show_footer {
            frame.render_widget(self.footer(model), foot_area);
        }
    }

    fn heading(&self, model: &Model, view: &Projection) -> Paragraph<'_> {
        let set = model.display_records();
        let text = if !model.view_options().pagination {
            format!(
                "Showing first {} records from {} total records",
                view.page_rows.len(),
                set.len()
            )
        } else if view.ordered.is_empty() {
            format!("No records match \"{}\"", model.search_term())
        } else {
            let first = (view.page - 1) * pipeline::PAGE_SIZE + 1;
            let last = first + view.page_rows.len().saturating_sub(1);
            format!(
                "Showing rows {}-{} of {} (page {}/{}) | {}",
                first.min(last),
                last,
                view.ordered.len(),
                view.page,
                view.page_count,
                if model.file_name().is_empty() {
                    "demonstration data"
                } else {
                    model.file_name()
                },
            )
        };
        Paragraph::new(Line::from(text.bold()))
    }

    fn render_records(&self, model: &Model, view: &Projection, frame: &mut Frame, area: Rect) {
        let set = model.display_records();
        let headers = set.headers();
        let widths = Self::column_widths(model, view);

        let header_cells = headers.iter().enumerate().map(|(cidx, h)| {
            let mut label = h.replace('_', " ");
            if model.sort().column.as_deref() == Some(h.as_str()) {
                label.push(match model.sort().direction {
                    Some(SortDirection::Descending) => '\u{2193}',
                    _ => '\u{2191}',
                });
            }
            let mut style = Style::new().add_modifier(Modifier::BOLD);
            if cidx == model.selected_column() {
                style = style.fg(Color::Black).bg(Color::Blue);
            }
            Cell::from(label).style(style)
        });

        let rows = view.page_rows.iter().map(|&ridx| {
            let cells = headers.iter().map(|h| {
                let value = set.value_at(ridx, h);
                if pipeline::is_abnormal(h, value) {
                    Cell::from(format!("{value} \u{26a0}"))
                        .style(Style::new().fg(Color::Red).add_modifier(Modifier::BOLD))
                } else {
                    Cell::from(value.to_string())
                }
            });
            Row::new(cells)
        });

        let table = Table::new(rows, widths)
            .header(Row::new(header_cells))
            .column_spacing(1);
        frame.render_widget(table, area);
    }

    fn footer(&self, model: &Model) -> Paragraph<'_> {
        let search_line = if model.search_active() {
            Self::input_line("Search: ", &model.input_state())
        } else if model.view_options().search {
            Line::from(vec![
                "Search: ".blue(),
                if model.search_term().is_empty() {
                    "(press / to search)".dark_gray()
                } else {
                    Span::raw(model.search_term().to_string())
                },
            ])
        } else {
            Line::from("")
        };
        let status_line = Line::from(model.status_message().to_string().green());
        Paragraph::new(Text::from(vec![search_line, status_line]))
    }

    /// Render a line editor with a block cursor at the edit position.
    fn input_line(prompt: &'static str, input: &crate::inputter::InputResult) -> Line<'static> {
        let split = input
            .input
            .char_indices()
            .nth(input.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(input.input.len());
        let (before, after) = input.input.split_at(split);
        Line::from(vec![
            prompt.blue().bold(),
            Span::raw(before.to_string()),
            "\u{2588}".slow_blink(),
            Span::raw(after.to_string()),
        ])
    }

    /// Column widths sized to the widest visible cell, capped so wide
    /// free-text columns cannot starve the rest.
    fn column_widths(model: &Model, view: &Projection) -> Vec<Constraint> {
        let set = model.display_records();
        set.headers()
            .iter()
            .map(|h| {
                let mut width = h.len() + 1;
                for &ridx in &view.page_rows {
                    // abnormal marker adds two display cells
                    width = width.max(set.value_at(ridx, h).len() + 2);
                }
                Constraint::Length((width as u16).min(MAX_COLUMN_WIDTH))
            })
            .collect()
    }
}
