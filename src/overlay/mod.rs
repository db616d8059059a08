//! Region selection across every attached display.
//!
//! A [`SelectionSession`] owns one transparent surface per display. Each
//! surface runs its own small state machine:
//!
//! ```text
//! Idle --down--> Dragging --move--> Dragging --up--> Closing
//!   \________________ Escape (any state) _____________/
//! ```
//!
//! The first pointer-up or Escape on any surface closes the whole session.
//! Surfaces are torn down together when the session is dropped, so none of
//! them can outlive it.

mod page;
#[cfg(feature = "desktop")]
mod window;

pub use page::init_script;
#[cfg(feature = "desktop")]
pub use window::{open_selection_overlay, OverlayWindow};

use crate::capture::Display;
use crate::geometry::{self, Absolute, Local, Point, Rect};

/// A drag must exceed this many pixels on both axes to count.
pub const MIN_SELECTION_PX: u32 = 10;

/// A platform overlay surface. Closing consumes it.
pub trait SurfaceHandle {
    fn close(self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Idle,
    Dragging {
        start: Point<Local>,
        current: Rect<Local>,
    },
    Closing,
}

/// What a pointer or key event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Still selecting.
    Continue,
    /// A selection was made; the session is now closing.
    Committed(Rect<Absolute>),
    /// Escape, or a drag too small to use; the session is now closing.
    Cancelled,
    /// Event arrived for an unknown surface, out of order, or after close.
    Ignored,
}

struct Surface<H> {
    display: Display,
    state: SurfaceState,
    handle: H,
}

pub struct SelectionSession<H: SurfaceHandle> {
    surfaces: Vec<Surface<H>>,
    closing: bool,
}

impl<H: SurfaceHandle> SelectionSession<H> {
    /// Opens one surface per display via `make`. If any surface fails to
    /// open, the ones already created are closed and the error returned.
    pub fn open<E>(
        displays: Vec<Display>,
        mut make: impl FnMut(usize, &Display) -> Result<H, E>,
    ) -> Result<Self, E> {
        let mut session = Self {
            surfaces: Vec::with_capacity(displays.len()),
            closing: false,
        };
        for (index, display) in displays.into_iter().enumerate() {
            let handle = make(index, &display)?;
            session.surfaces.push(Surface {
                display,
                state: SurfaceState::Idle,
                handle,
            });
        }
        log::info!("[OVERLAY] Session opened on {} displays", session.surfaces.len());
        Ok(session)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn state(&self, surface: usize) -> Option<SurfaceState> {
        self.surfaces.get(surface).map(|s| s.state)
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn pointer_down(&mut self, surface: usize, at: Point<Local>) -> SessionEvent {
        if self.closing {
            return SessionEvent::Ignored;
        }
        let Some(s) = self.surfaces.get_mut(surface) else {
            return SessionEvent::Ignored;
        };
        s.state = SurfaceState::Dragging {
            start: at,
            current: Rect::new(at.x, at.y, 0, 0),
        };
        SessionEvent::Continue
    }

    /// Updates the live selection. Nothing is committed until pointer-up.
    pub fn pointer_move(&mut self, surface: usize, at: Point<Local>) -> SessionEvent {
        if self.closing {
            return SessionEvent::Ignored;
        }
        match self.surfaces.get_mut(surface) {
            Some(Surface {
                state: SurfaceState::Dragging { start, current },
                ..
            }) => {
                *current = geometry::rect_from_corners(*start, at);
                SessionEvent::Continue
            }
            _ => SessionEvent::Ignored,
        }
    }

    pub fn pointer_up(&mut self, surface: usize, at: Point<Local>) -> SessionEvent {
        if self.closing {
            return SessionEvent::Ignored;
        }
        let (start, bounds) = match self.surfaces.get(surface) {
            Some(Surface {
                state: SurfaceState::Dragging { start, .. },
                display,
                ..
            }) => (*start, display.bounds),
            _ => return SessionEvent::Ignored,
        };

        self.begin_closing();

        let local = geometry::rect_from_corners(start, at);
        if local.width <= MIN_SELECTION_PX || local.height <= MIN_SELECTION_PX {
            log::info!(
                "[OVERLAY] Discarded {}x{} selection (need more than {}px)",
                local.width,
                local.height,
                MIN_SELECTION_PX
            );
            return SessionEvent::Cancelled;
        }

        let absolute: Rect<Absolute> = geometry::translate(local, bounds.x, bounds.y);
        log::info!(
            "[OVERLAY] Selection on surface {}: local ({},{}) -> absolute ({},{}) {}x{}",
            surface,
            local.x,
            local.y,
            absolute.x,
            absolute.y,
            absolute.width,
            absolute.height
        );
        SessionEvent::Committed(absolute)
    }

    pub fn escape(&mut self) -> SessionEvent {
        if self.closing {
            return SessionEvent::Ignored;
        }
        log::info!("[OVERLAY] Selection cancelled");
        self.begin_closing();
        SessionEvent::Cancelled
    }

    /// Tears down every surface at once.
    pub fn close(self) {
        drop(self);
    }

    fn begin_closing(&mut self) {
        self.closing = true;
        for s in &mut self.surfaces {
            s.state = SurfaceState::Closing;
        }
    }
}

impl<H: SurfaceHandle> Drop for SelectionSession<H> {
    fn drop(&mut self) {
        let count = self.surfaces.len();
        for surface in self.surfaces.drain(..) {
            surface.handle.close();
        }
        log::debug!("[OVERLAY] Closed {} surfaces", count);
    }
}

/// Brings back whatever was hidden for the overlay unless disarmed.
///
/// Armed right after the main window is hidden; every early return or
/// error before the session is stored then re-shows it.
pub struct RestoreOnExit<F: FnOnce()> {
    restore: Option<F>,
}

impl<F: FnOnce()> RestoreOnExit<F> {
    pub fn new(restore: F) -> Self {
        Self {
            restore: Some(restore),
        }
    }

    /// The overlay is up; leave the main window hidden.
    pub fn disarm(mut self) {
        self.restore = None;
    }
}

impl<F: FnOnce()> Drop for RestoreOnExit<F> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::display::test_display;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeSurface {
        index: usize,
        closed: Rc<RefCell<Vec<usize>>>,
    }

    impl SurfaceHandle for FakeSurface {
        fn close(self) {
            self.closed.borrow_mut().push(self.index);
        }
    }

    fn open_two() -> (SelectionSession<FakeSurface>, Rc<RefCell<Vec<usize>>>) {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let displays = vec![
            test_display("1", 0, 0, 1920, 1080, 1.0),
            test_display("2", -1280, -100, 1280, 1024, 1.0),
        ];
        let session = SelectionSession::open(displays, |index, _| {
            Ok::<_, ()>(FakeSurface {
                index,
                closed: Rc::clone(&closed),
            })
        })
        .unwrap();
        (session, closed)
    }

    #[test]
    fn drag_commits_absolute_rect() {
        let (mut session, _) = open_two();
        assert_eq!(session.pointer_down(1, Point::new(400, 300)), SessionEvent::Continue);
        assert_eq!(session.pointer_move(1, Point::new(200, 250)), SessionEvent::Continue);
        assert_eq!(
            session.state(1),
            Some(SurfaceState::Dragging {
                start: Point::new(400, 300),
                current: Rect::new(200, 250, 200, 50),
            })
        );

        let event = session.pointer_up(1, Point::new(100, 200));
        assert_eq!(event, SessionEvent::Committed(Rect::new(-1180, 100, 300, 100)));
        assert!(session.is_closing());
        assert_eq!(session.state(0), Some(SurfaceState::Closing));
    }

    #[test]
    fn threshold_is_strictly_greater_than_ten() {
        let (mut session, _) = open_two();
        session.pointer_down(0, Point::new(100, 50));
        assert_eq!(session.pointer_up(0, Point::new(110, 60)), SessionEvent::Cancelled);

        let (mut session, _) = open_two();
        session.pointer_down(0, Point::new(100, 50));
        assert_eq!(
            session.pointer_up(0, Point::new(111, 61)),
            SessionEvent::Committed(Rect::new(100, 50, 11, 11))
        );
    }

    #[test]
    fn thin_drag_is_discarded() {
        let (mut session, _) = open_two();
        session.pointer_down(0, Point::new(0, 0));
        assert_eq!(session.pointer_up(0, Point::new(500, 5)), SessionEvent::Cancelled);
    }

    #[test]
    fn escape_closes_everything_without_emitting() {
        let (mut session, _) = open_two();
        session.pointer_down(0, Point::new(0, 0));
        assert_eq!(session.escape(), SessionEvent::Cancelled);
        assert_eq!(session.pointer_up(0, Point::new(300, 300)), SessionEvent::Ignored);
        assert_eq!(session.escape(), SessionEvent::Ignored);
    }

    #[test]
    fn only_first_commit_counts() {
        let (mut session, _) = open_two();
        session.pointer_down(0, Point::new(0, 0));
        session.pointer_down(1, Point::new(0, 0));
        assert!(matches!(
            session.pointer_up(0, Point::new(50, 50)),
            SessionEvent::Committed(_)
        ));
        assert_eq!(session.pointer_up(1, Point::new(50, 50)), SessionEvent::Ignored);
    }

    #[test]
    fn up_without_down_is_ignored() {
        let (mut session, _) = open_two();
        assert_eq!(session.pointer_up(0, Point::new(50, 50)), SessionEvent::Ignored);
        assert_eq!(session.pointer_move(0, Point::new(50, 50)), SessionEvent::Ignored);
        assert_eq!(session.pointer_down(7, Point::new(0, 0)), SessionEvent::Ignored);
        assert!(!session.is_closing());
    }

    #[test]
    fn closing_tears_down_all_surfaces() {
        let (mut session, closed) = open_two();
        session.escape();
        assert!(closed.borrow().is_empty());
        session.close();
        assert_eq!(*closed.borrow(), vec![0, 1]);
    }

    #[test]
    fn failed_open_closes_created_surfaces() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let displays = vec![
            test_display("1", 0, 0, 10, 10, 1.0),
            test_display("2", 10, 0, 10, 10, 1.0),
        ];
        let result = SelectionSession::open(displays, |index, _| {
            if index == 1 {
                return Err("window creation failed");
            }
            Ok(FakeSurface {
                index,
                closed: Rc::clone(&closed),
            })
        });
        assert!(result.is_err());
        assert_eq!(*closed.borrow(), vec![0]);
    }

    fn open_overlay(
        fail: bool,
        shown: &Rc<RefCell<u32>>,
    ) -> Result<SelectionSession<FakeSurface>, &'static str> {
        let restore = RestoreOnExit::new(|| *shown.borrow_mut() += 1);
        let closed = Rc::new(RefCell::new(Vec::new()));
        let session = SelectionSession::open(vec![test_display("1", 0, 0, 10, 10, 1.0)], |index, _| {
            if fail {
                return Err("no displays");
            }
            Ok(FakeSurface { index, closed: Rc::clone(&closed) })
        })?;
        restore.disarm();
        Ok(session)
    }

    #[test]
    fn failed_overlay_open_restores_main_window() {
        let shown = Rc::new(RefCell::new(0));
        assert!(open_overlay(true, &shown).is_err());
        assert_eq!(*shown.borrow(), 1);
    }

    #[test]
    fn opened_overlay_keeps_main_window_hidden() {
        let shown = Rc::new(RefCell::new(0));
        let session = open_overlay(false, &shown).unwrap();
        assert_eq!(session.surface_count(), 1);
        assert_eq!(*shown.borrow(), 0);
    }
}
