use ratatui::layout::Rect;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::event::AppEvent;
use crate::supervisor::{Launcher, Session};
use crate::ui::{self, Display};

/// Pointer position in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
}

impl Cursor {
    pub fn center(width: u16, height: u16) -> Self {
        Self {
            x: width / 2,
            y: height / 2,
        }
    }

    /// Move by `(dx, dy)`, clamped to a `width` x `height` surface.
    pub fn moved(self, dx: i16, dy: i16, width: u16, height: u16) -> Self {
        fn step(value: u16, delta: i16, size: u16) -> u16 {
            let max = i32::from(size.saturating_sub(1));
            (i32::from(value) + i32::from(delta)).clamp(0, max) as u16
        }
        Self {
            x: step(self.x, dx, width),
            y: step(self.y, dy, height),
        }
    }
}

/// Browsing the catalog.
#[derive(Debug, Default)]
pub struct MenuState {
    /// `None` until the first render, which centres it.
    cursor: Option<Cursor>,
    hovered: Option<usize>,
}

impl MenuState {
    fn cursor(&mut self, width: u16, height: u16) -> Cursor {
        let cursor = self
            .cursor
            .unwrap_or_else(|| Cursor::center(width, height))
            .moved(0, 0, width, height);
        self.cursor = Some(cursor);
        cursor
    }

    fn move_cursor(&mut self, dx: i16, dy: i16, width: u16, height: u16) {
        let cursor = self.cursor(width, height).moved(dx, dy, width, height);
        self.cursor = Some(cursor);
    }

    fn update_hover(&mut self, width: u16, height: u16, count: usize) {
        let cursor = self.cursor(width, height);
        self.hovered = ui::item_at(Rect::new(0, 0, width, height), count, cursor);
    }
}

/// The external program owns the screen.
#[derive(Debug)]
pub struct PlayingState {
    session: Session,
}

impl PlayingState {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[derive(Debug)]
pub enum State {
    Menu(MenuState),
    Playing(PlayingState),
}

/// Central application state, owned exclusively by the main thread.
///
/// Holds the one active [`State`] plus the catalog, and the collaborators
/// the states act through.
pub struct Context<D, L> {
    state: State,
    catalog: Catalog,
    display: D,
    launcher: L,
}

impl<D: Display, L: Launcher> Context<D, L> {
    pub fn new(catalog: Catalog, display: D, launcher: L) -> Self {
        Self {
            state: State::Menu(MenuState::default()),
            catalog,
            display,
            launcher,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_menu(&self) -> bool {
        matches!(self.state, State::Menu(_))
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Name of the catalog item under the cursor, while in the menu.
    pub fn hovered_item(&self) -> Option<&str> {
        match &self.state {
            State::Menu(menu) => menu
                .hovered
                .and_then(|i| self.catalog.items().get(i))
                .map(String::as_str),
            State::Playing(_) => None,
        }
    }

    /// Draw the menu. Does nothing while playing.
    pub fn render(&mut self) -> Result<()> {
        let State::Menu(menu) = &mut self.state else {
            return Ok(());
        };
        let (width, height) = self.display.size();
        menu.update_hover(width, height, self.catalog.items().len());
        let cursor = menu.cursor(width, height);
        self.display
            .render(self.catalog.items(), cursor, menu.hovered)
    }

    /// Process one event to completion.
    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match &mut self.state {
            State::Menu(menu) => match event {
                AppEvent::InputMoved { dx, dy } => {
                    let (width, height) = self.display.size();
                    menu.move_cursor(dx, dy, width, height);
                    self.render()?;
                }
                AppEvent::SelectionConfirmed { item } => self.launch(&item)?,
                AppEvent::MediaInserted => {
                    self.catalog.refresh();
                    info!(count = self.catalog.items().len(), "catalog reloaded after insertion");
                    self.render()?;
                }
                AppEvent::ProcessExited { session, exit_code } => {
                    debug!(%session, ?exit_code, "exit of a cancelled session ignored");
                }
            },
            State::Playing(playing) => match event {
                AppEvent::ProcessExited { session, exit_code } if session == playing.session.id() => {
                    info!(
                        %session,
                        ?exit_code,
                        item = %playing.session().item().display(),
                        "game closed, back to menu"
                    );
                    self.display.resume()?;
                    self.enter_menu()?;
                }
                AppEvent::MediaInserted => {
                    info!(session = %playing.session().id(), "media inserted while playing");
                    playing.session.request_cancellation();
                    self.display.resume()?;
                    self.catalog.refresh();
                    self.enter_menu()?;
                }
                other => debug!(?other, "ignored while playing"),
            },
        }
        Ok(())
    }

    fn launch(&mut self, item: &str) -> Result<()> {
        if !self.catalog.items().iter().any(|i| i == item) {
            warn!(item, "selected item is no longer in the catalog");
            return Ok(());
        }

        self.display.suspend()?;
        let path = self.catalog.path_of(item);
        match self.launcher.launch(&path) {
            Ok(session) => {
                info!(session = %session.id(), item, "menu -> playing");
                self.state = State::Playing(PlayingState { session });
                Ok(())
            }
            Err(e) => {
                error!(item, "could not start session: {e}");
                self.display.resume()?;
                self.render()
            }
        }
    }

    fn enter_menu(&mut self) -> Result<()> {
        self.state = State::Menu(MenuState::default());
        self.render()
    }
}
