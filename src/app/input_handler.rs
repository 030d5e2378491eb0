use crossterm::event::{Event, KeyEvent, KeyEventKind};
use tracing::debug;

use super::App;
use crate::session::SessionHandle;

/// Routes one terminal event. Focus changes stand in for the app moving
/// between foreground and background.
pub fn handle_event(event: Event, app: &mut App, session: &SessionHandle) {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(key, app, session),
        Event::FocusGained => {
            debug!("terminal focused, connecting");
            session.connect();
        }
        Event::FocusLost if app.disconnect_on_blur => {
            debug!("terminal lost focus, disconnecting");
            session.disconnect();
        }
        _ => {}
    }
}

pub fn handle_key(key: KeyEvent, app: &mut App, session: &SessionHandle) {
    let keys = &app.keys;

    if keys.matches(key, &keys.quit) {
        app.is_running = false;
        return;
    }

    if keys.matches(key, &keys.play_pause) {
        if app.is_paused() {
            session.play();
            app.show_toast("▶ Play");
        } else {
            session.pause();
            app.show_toast("⏸ Pause");
        }
        return;
    }

    if keys.matches(key, &keys.next_track) {
        session.skip_to_next();
        app.show_toast("⏭ Next Track");
        return;
    }

    if keys.matches(key, &keys.prev_track) {
        session.skip_to_previous();
        app.show_toast("⏮ Previous Track");
        return;
    }

    if keys.matches(key, &keys.seek_forward) || keys.matches(key, &keys.seek_forward_alt) {
        let step = app.seek_step_secs;
        session.seek_relative(step);
        app.show_toast(&format!("⏩ +{}s", step));
        return;
    }

    if keys.matches(key, &keys.seek_backward) || keys.matches(key, &keys.seek_backward_alt) {
        let step = app.seek_step_secs;
        session.seek_relative(-step);
        app.show_toast(&format!("⏪ -{}s", step));
        return;
    }

    if keys.matches(key, &keys.connect) {
        session.connect();
        return;
    }

    if keys.matches(key, &keys.disconnect) {
        session.disconnect();
        return;
    }

    if keys.matches(key, &keys.authorize) {
        session.authorize();
    }
}
