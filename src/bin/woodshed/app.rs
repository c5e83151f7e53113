//! Application loop: poll engine state, draw, translate keys into the
//! engine's validated setters.

use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;

use woodshed::engine::Metronome;

use crate::ui;

pub struct App {
    engine: Metronome,
    /// Last start failure, shown until the next successful start.
    status: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            engine: Metronome::new(),
            status: None,
            should_quit: false,
        }
    }

    pub fn run(mut self, mut terminal: DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            let snapshot = self.engine.snapshot();
            terminal.draw(|frame| ui::render(frame, &snapshot, self.status.as_deref()))?;

            // Non-blocking input, ~60fps refresh.
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.engine.stop();
                self.should_quit = true;
            }
            KeyCode::Char(' ') => self.toggle(),
            KeyCode::Up => self.nudge_bpm(5.0),
            KeyCode::Down => self.nudge_bpm(-5.0),
            KeyCode::Right => self.nudge_bpm(1.0),
            KeyCode::Left => self.nudge_bpm(-1.0),
            KeyCode::Char('b') => self.nudge_beats(1.0),
            KeyCode::Char('B') => self.nudge_beats(-1.0),
            KeyCode::Char('n') => self.nudge_play_every(1.0),
            KeyCode::Char('N') => self.nudge_play_every(-1.0),
            KeyCode::Char('c') => self.nudge_count_in(1.0),
            KeyCode::Char('C') => self.nudge_count_in(-1.0),
            _ => {}
        }
    }

    fn toggle(&mut self) {
        if self.engine.is_playing() {
            self.engine.stop();
        } else {
            match self.engine.start() {
                Ok(()) => self.status = None,
                Err(err) => self.status = Some(format!("audio unavailable: {err}")),
            }
        }
    }

    // The setters reject out-of-range values and keep the previous one, so
    // nudging past a limit simply pins the parameter there.

    fn nudge_bpm(&mut self, delta: f64) {
        let bpm = f64::from(self.engine.params().bpm);
        self.engine.set_bpm(bpm + delta);
    }

    fn nudge_beats(&mut self, delta: f64) {
        let beats = f64::from(self.engine.params().beats_per_measure);
        self.engine.set_beats_per_measure(beats + delta);
    }

    fn nudge_play_every(&mut self, delta: f64) {
        let n = f64::from(self.engine.params().play_every_n);
        self.engine.set_play_every_n(n + delta);
    }

    fn nudge_count_in(&mut self, delta: f64) {
        let measures = f64::from(self.engine.params().count_in_measures);
        self.engine.set_count_in_measures(measures + delta);
    }
}
