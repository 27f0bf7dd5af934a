use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};
use tracing::trace;

use crate::domain::{MdvConfig, MdvError, Message};
use crate::model::{Model, Screen};

/// Maps terminal events to `Message`s. Which keys mean what depends on
/// the model's screen and whether a line editor is active.
pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &MdvConfig) -> Self {
        Controller {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, MdvError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.handle_key(model, key));
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: event::KeyEvent) -> Option<Message> {
        // Ctrl+C quits whatever state the ui is in, including line editing
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Message::Quit);
        }
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = match model.screen() {
            Screen::Upload => None,
            Screen::Loading => match key.code {
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            },
            Screen::Table => match key.code {
                KeyCode::Char('q') => Some(Message::Quit),
                KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
                KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
                KeyCode::Enter | KeyCode::Char('s') => Some(Message::ToggleSort),
                KeyCode::Char('/') => Some(Message::Search),
                KeyCode::Char(']') | KeyCode::PageDown => Some(Message::NextPage),
                KeyCode::Char('[') | KeyCode::PageUp => Some(Message::PrevPage),
                KeyCode::Char('e') => Some(Message::ExportCsv),
                KeyCode::Char('n') | KeyCode::Char('x') => Some(Message::NewUpload),
                _ => None,
            },
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_records;
    use ratatui::crossterm::event::KeyEvent;

    fn table_model() -> Model {
        let mut model = Model::new(MdvConfig::default().loading_delay_ms(0));
        model.submit_upload("patients.csv".into(), sample_records());
        model.tick();
        model
    }

    #[test]
    fn upload_screen_keys_are_raw() {
        let controller = Controller::new(&MdvConfig::default());
        let model = Model::new(MdvConfig::default());
        let msg = controller.handle_key(&model, KeyEvent::from(KeyCode::Char('q')));
        assert!(matches!(msg, Some(Message::RawKey(_))));
    }

    #[test]
    fn ctrl_c_always_quits() {
        let controller = Controller::new(&MdvConfig::default());
        let model = Model::new(MdvConfig::default());
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(
            controller.handle_key(&model, key),
            Some(Message::Quit)
        ));
    }

    #[test]
    fn table_screen_key_mapping() {
        let controller = Controller::new(&MdvConfig::default());
        let model = table_model();
        let cases = [
            (KeyCode::Char('q'), "Quit"),
            (KeyCode::Left, "MoveLeft"),
            (KeyCode::Char('l'), "MoveRight"),
            (KeyCode::Enter, "ToggleSort"),
            (KeyCode::Char('/'), "Search"),
            (KeyCode::Char(']'), "NextPage"),
            (KeyCode::PageUp, "PrevPage"),
            (KeyCode::Char('e'), "ExportCsv"),
            (KeyCode::Char('n'), "NewUpload"),
        ];
        for (code, expected) in cases {
            let msg = controller.handle_key(&model, KeyEvent::from(code));
            assert_eq!(format!("{:?}", msg.unwrap()), expected, "key {code:?}");
        }
        assert!(
            controller
                .handle_key(&model, KeyEvent::from(KeyCode::Char('z')))
                .is_none()
        );
    }
}
