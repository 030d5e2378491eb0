use crossterm::event::Event;

use crate::session::{SessionEvent, SessionSnapshot};

pub enum AppEvent {
    Input(Event),
    SessionUpdate(SessionSnapshot),
    Notice(SessionEvent),
    Tick,
}
