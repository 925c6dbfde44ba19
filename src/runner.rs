//! The cooperative main loop.
//!
//! In the menu it runs at a fixed cadence: at most one insertion, then at
//! most one move and one confirm from the input device, then a frame. While
//! a game runs it does nothing but drain the queue as fast as it can, so
//! the menu is back the moment the game exits.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

use crate::app::Context;
use crate::event::AppEvent;
use crate::input::InputSource;
use crate::queue::EventQueue;
use crate::supervisor::Launcher;
use crate::ui::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct MainLoop<D, L, I> {
    context: Context<D, L>,
    queue: EventQueue,
    input: I,
    frame: Duration,
}

impl<D: Display, L: Launcher, I: InputSource> MainLoop<D, L, I> {
    pub fn new(context: Context<D, L>, queue: EventQueue, input: I, frame: Duration) -> Self {
        Self {
            context,
            queue,
            input,
            frame,
        }
    }

    /// Run until the operator quits from the menu.
    pub fn run(&mut self) -> Result<()> {
        self.context.render()?;
        let mut pacer = Pacer::new(self.frame);
        loop {
            if self.context.is_menu() {
                if self.menu_tick()? == Flow::Quit {
                    return Ok(());
                }
                if self.context.is_menu() {
                    pacer.wait();
                }
            } else {
                self.playing_tick()?;
                thread::yield_now();
            }
        }
    }

    fn menu_tick(&mut self) -> Result<Flow> {
        if let Some(event) = self.queue.take_first(AppEvent::is_media_inserted) {
            self.context.handle_event(event)?;
        }
        // Exits of sessions cancelled by an insertion land here.
        for stale in self.queue.drain_matching(AppEvent::is_process_exited) {
            self.context.handle_event(stale)?;
        }

        let input = self.input.poll()?;
        if input.quit {
            debug!("quit requested from the menu");
            return Ok(Flow::Quit);
        }

        // First sample of each kind wins; the rest of this tick's are dropped.
        if let Some(&(dx, dy)) = input.moves.first() {
            self.context.handle_event(AppEvent::InputMoved { dx, dy })?;
        }
        if input.confirm {
            match self.context.hovered_item().map(str::to_owned) {
                Some(item) => self
                    .context
                    .handle_event(AppEvent::SelectionConfirmed { item })?,
                None => debug!("confirm with nothing under the cursor"),
            }
        }

        self.context.render()?;
        Ok(Flow::Continue)
    }

    fn playing_tick(&mut self) -> Result<()> {
        for event in self.queue.drain_all() {
            self.context.handle_event(event)?;
        }
        Ok(())
    }
}

/// Caps the menu at one iteration per frame.
struct Pacer {
    frame: Duration,
    last: Instant,
}

impl Pacer {
    fn new(frame: Duration) -> Self {
        Self {
            frame,
            last: Instant::now(),
        }
    }

    fn wait(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < self.frame {
            thread::sleep(self.frame - elapsed);
        }
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;

    use super::*;
    use crate::app::tests::{fixture, FakeDisplay, FakeLauncher, Fixture, SharedJournal};
    use crate::app::Cursor;
    use crate::event::SessionId;
    use crate::input::TickInput;

    struct ScriptedInput(VecDeque<TickInput>);

    impl InputSource for ScriptedInput {
        fn poll(&mut self) -> crate::error::Result<TickInput> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    struct Harness {
        roms: tempfile::TempDir,
        journal: SharedJournal,
        queue: EventQueue,
        main_loop: MainLoop<FakeDisplay, FakeLauncher, ScriptedInput>,
    }

    fn harness(items: &[&str], ticks: Vec<TickInput>) -> Harness {
        let Fixture {
            roms,
            journal,
            context,
        } = fixture(items, false);
        let queue = EventQueue::new();
        let main_loop = MainLoop::new(
            context,
            queue.clone(),
            ScriptedInput(ticks.into()),
            Duration::from_millis(1),
        );
        Harness {
            roms,
            journal,
            queue,
            main_loop,
        }
    }

    fn moves(moves: &[(i16, i16)]) -> TickInput {
        TickInput {
            moves: moves.to_vec(),
            ..TickInput::default()
        }
    }

    fn last_cursor(journal: &SharedJournal) -> Cursor {
        journal.borrow().renders.last().map(|r| r.0).unwrap()
    }

    #[test]
    fn only_first_move_of_a_tick_is_applied() {
        let mut h = harness(&["foo"], vec![moves(&[(5, 0), (5, 0)])]);
        h.main_loop.context.render().unwrap();
        assert_eq!(last_cursor(&h.journal), Cursor { x: 20, y: 10 });

        h.main_loop.menu_tick().unwrap();
        assert_eq!(last_cursor(&h.journal), Cursor { x: 25, y: 10 });
    }

    #[test]
    fn confirm_launches_the_hovered_item() {
        // centre is (20, 10); item 0 is on row 4
        let mut h = harness(
            &["foo"],
            vec![TickInput {
                moves: vec![(0, -6)],
                confirm: true,
                quit: false,
            }],
        );
        h.main_loop.menu_tick().unwrap();

        assert!(!h.main_loop.context.is_menu());
        assert_eq!(h.journal.borrow().launches, vec![h.roms.path().join("foo")]);
    }

    #[test]
    fn confirm_over_empty_space_does_nothing() {
        let mut h = harness(
            &["foo"],
            vec![TickInput {
                confirm: true,
                ..TickInput::default()
            }],
        );
        h.main_loop.menu_tick().unwrap();
        assert!(h.main_loop.context.is_menu());
        assert!(h.journal.borrow().launches.is_empty());
    }

    #[test]
    fn one_insertion_per_menu_tick() {
        let mut h = harness(&[], vec![]);
        h.queue.publish(AppEvent::MediaInserted);
        h.queue.publish(AppEvent::MediaInserted);

        h.main_loop.menu_tick().unwrap();
        assert_eq!(h.queue.len(), 1);
        h.main_loop.menu_tick().unwrap();
        assert_eq!(h.queue.len(), 0);
    }

    #[test]
    fn stale_exits_are_cleared_in_the_menu() {
        let mut h = harness(&["foo"], vec![]);
        h.queue.publish(AppEvent::ProcessExited {
            session: SessionId(7),
            exit_code: None,
        });
        h.main_loop.menu_tick().unwrap();
        assert_eq!(h.queue.len(), 0);
        assert!(h.main_loop.context.is_menu());
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut h = harness(
            &["foo"],
            vec![TickInput {
                quit: true,
                ..TickInput::default()
            }],
        );
        h.main_loop.run().unwrap();
        assert!(h.main_loop.context.is_menu());
    }

    #[test]
    fn playing_tick_dispatches_everything_in_order() {
        let mut h = harness(&["foo"], vec![]);
        h.main_loop
            .context
            .handle_event(AppEvent::SelectionConfirmed {
                item: String::from("foo"),
            })
            .unwrap();

        fs::write(h.roms.path().join("bar.nes"), b"").unwrap();
        h.queue.publish(AppEvent::ProcessExited {
            session: SessionId(1),
            exit_code: Some(0),
        });
        h.queue.publish(AppEvent::MediaInserted);

        h.main_loop.playing_tick().unwrap();
        assert!(h.main_loop.context.is_menu());
        assert_eq!(h.main_loop.context.catalog().items(), ["bar.nes", "foo"]);
        assert_eq!(h.queue.len(), 0);
        // exit resumed once; the insertion was handled by the menu
        let resumes = h
            .journal
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with("resume"))
            .count();
        assert_eq!(resumes, 1);
    }
}
