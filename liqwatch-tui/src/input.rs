//! Keyboard dispatch: global keys first, then tab-specific ones.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{Action, AppState, Tab};

/// Apply a key to the state. Returns pipeline work for the event loop, if any.
pub fn handle_key(app: &mut AppState, key: KeyEvent) -> Option<Action> {
    // Windows reports both Press and Release.
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.running = false;
            return None;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.running = false;
            return None;
        }
        KeyCode::Char('1') => {
            app.tab = Tab::Overview;
            return None;
        }
        KeyCode::Char('2') => {
            app.tab = Tab::Backtest;
            return None;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.tab = app.tab.next();
            return None;
        }
        KeyCode::Left | KeyCode::Char('[') => return app.select_prev(),
        KeyCode::Right | KeyCode::Char(']') => return app.select_next(),
        KeyCode::Char('r') => return app.refresh_selected(),
        _ => {}
    }

    if app.tab == Tab::Backtest {
        handle_backtest_key(app, key);
    }
    None
}

fn handle_backtest_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('h') => app.shift_start(-1),
        KeyCode::Char('l') => app.shift_start(1),
        KeyCode::Char('H') => app.shift_end(-1),
        KeyCode::Char('L') => app.shift_end(1),
        KeyCode::Char('j') => app.shift_start(-20),
        KeyCode::Char('k') => app.shift_start(20),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> AppState {
        AppState::new(vec!["AAPL".into(), "MSFT".into()])
    }

    #[test]
    fn quit_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Esc] {
            let mut app = app();
            assert_eq!(handle_key(&mut app, press(code)), None);
            assert!(!app.running);
        }
        let mut app = app();
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!app.running);
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app();
        let key = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(handle_key(&mut app, key), None);
        assert!(app.running);
    }

    #[test]
    fn tab_switching() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Tab));
        assert_eq!(app.tab, Tab::Backtest);
        handle_key(&mut app, press(KeyCode::Char('1')));
        assert_eq!(app.tab, Tab::Overview);
        handle_key(&mut app, press(KeyCode::Char('2')));
        assert_eq!(app.tab, Tab::Backtest);
    }

    #[test]
    fn ticker_keys_emit_actions() {
        let mut app = app();
        assert_eq!(
            handle_key(&mut app, press(KeyCode::Right)),
            Some(Action::Load("MSFT".into()))
        );
        assert_eq!(
            handle_key(&mut app, press(KeyCode::Char('['))),
            Some(Action::Load("AAPL".into()))
        );
        assert_eq!(
            handle_key(&mut app, press(KeyCode::Char('r'))),
            Some(Action::Refresh("AAPL".into()))
        );
    }

    #[test]
    fn range_keys_only_apply_on_backtest_tab() {
        use chrono::{Duration, NaiveDate};
        use liqwatch_core::{Bar, FeatureRow, FeatureTable};

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..100)
            .map(|i| FeatureRow {
                bar: Bar {
                    date: start + Duration::days(i),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    adj_close: 1.0,
                    volume: 1,
                },
                ret: 0.0,
                illiquidity: 0.0,
                z_score: 0.0,
                anomaly: false,
            })
            .collect();
        let mut app = app();
        app.set_table(FeatureTable::new("AAPL", rows));
        let before = app.range;

        handle_key(&mut app, press(KeyCode::Char('h')));
        assert_eq!(app.range, before);

        app.tab = Tab::Backtest;
        handle_key(&mut app, press(KeyCode::Char('h')));
        handle_key(&mut app, press(KeyCode::Char('H')));
        let range = app.range.unwrap();
        assert_eq!((range.start, range.end), (39, 98));
    }
}
