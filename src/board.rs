/// The deck bound to its history
///
/// Owns the card list, the navigation state and the running disintegration,
/// and keeps the three consistent with the history database. A deletion is a
/// round trip: the focused card is captured and disintegrated, its removal is
/// asked of the history, and the session only ends once the history reports a
/// new length. Each deletion gets an epoch so completions and timeouts left
/// over from an earlier one are ignored.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::{LayoutConfig, SnapConfig};
use crate::deck::{Command, Deck, RenderSlot, SessionPhase};
use crate::snap::rng::XorShiftRng;
use crate::snap::{CompletionNotifier, Disintegration, StartOutcome, StepOutcome, Surface};
use crate::state::data::{Artifact, CardRecord};
use crate::state::history::{History, HistoryChanged};

/// What the history did with a removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// The card was no longer there
    AlreadyGone,
    Failed,
}

/// A removal handed to the history after a disintegration finished.
///
/// The card stays hidden until the history confirms; the caller arms a
/// restore timeout for `epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    pub epoch: u64,
    pub removal: Removal,
}

pub struct Board<S: Surface> {
    history: History,
    history_events: UnboundedReceiver<HistoryChanged>,
    /// Cards in deck order, newest first
    cards: Vec<CardRecord>,
    deck: Deck,
    layout: LayoutConfig,
    snap: SnapConfig,
    /// The running (or finished) disintegration of the focused card
    engine: Option<Disintegration<S, XorShiftRng>>,
    completions: UnboundedReceiver<u64>,
    completion_tx: UnboundedSender<u64>,
    epoch: u64,
}

impl<S: Surface> Board<S> {
    pub fn new(mut history: History, layout: LayoutConfig, snap: SnapConfig) -> Self {
        let history_events = history.subscribe();
        let cards = history.list().unwrap_or_else(|err| {
            log::error!("failed to load cards: {err}");
            Vec::new()
        });
        let (completion_tx, completions) = mpsc::unbounded_channel();

        Self {
            deck: Deck::new(cards.len(), layout),
            history,
            history_events,
            cards,
            layout,
            snap,
            engine: None,
            completions,
            completion_tx,
            epoch: 0,
        }
    }

    pub fn cards(&self) -> &[CardRecord] {
        &self.cards
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn engine(&self) -> Option<&Disintegration<S, XorShiftRng>> {
        self.engine.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        self.engine.as_ref().is_some_and(Disintegration::is_running)
    }

    pub fn focused_record(&self) -> Option<&CardRecord> {
        self.deck.focused_card().and_then(|index| self.cards.get(index))
    }

    /// Lay out the mounted cards around the focus
    pub fn render(&self, viewport_width: f32) -> Vec<RenderSlot> {
        let ids: Vec<_> = self.cards.iter().map(|card| card.id).collect();
        self.deck.render(&ids, viewport_width)
    }

    pub fn navigate(&mut self, command: Command) -> bool {
        self.deck.apply(command)
    }

    fn phase(&self) -> Option<SessionPhase> {
        self.deck.session().map(|session| session.phase)
    }

    pub fn is_capturing(&self) -> bool {
        self.phase() == Some(SessionPhase::Capturing)
    }

    /// Lock the deck for deleting the focused card and return the new epoch
    pub fn begin_deletion(&mut self) -> Option<u64> {
        let ticket = self.deck.request_delete()?;
        self.epoch += 1;
        log::debug!("capturing card {} for disintegration", ticket.target);
        Some(self.epoch)
    }

    /// Disintegrate the captured card. `None` if no capture was pending.
    pub fn start_disintegration(&mut self, surface: S, rng: XorShiftRng) -> Option<StartOutcome> {
        if !self.is_capturing() {
            return None;
        }

        let epoch = self.epoch;
        let tx = self.completion_tx.clone();
        let notifier = CompletionNotifier::new(move || {
            let _ = tx.send(epoch);
        });

        let mut engine = Disintegration::new(surface, rng, self.snap, notifier);
        let outcome = engine.start();
        // Choreography starts either way; a fallback has already completed
        self.deck.on_disintegration_started();
        self.engine = Some(engine);
        Some(outcome)
    }

    /// Advance the fragments by one frame
    pub fn step(&mut self) -> StepOutcome {
        self.engine
            .as_mut()
            .map_or(StepOutcome::Inactive, Disintegration::step)
    }

    /// Handle completion signals sent by the engine's notifier
    pub fn drain_completions(&mut self) -> Option<Committed> {
        let mut committed = None;
        while let Ok(epoch) = self.completions.try_recv() {
            if epoch != self.epoch {
                continue;
            }
            if let Some(request) = self.deck.on_disintegration_complete() {
                let removal = self.remove(request.index);
                committed = Some(Committed { epoch, removal });
            }
        }
        committed
    }

    fn remove(&mut self, index: usize) -> Removal {
        let removal = match self.cards.get(index).map(|card| card.id) {
            Some(id) => match self.history.remove(id) {
                Ok(true) => Removal::Removed,
                Ok(false) => {
                    log::warn!("card {id} vanished before its removal");
                    Removal::AlreadyGone
                }
                Err(err) => {
                    log::error!("failed to remove card {id}: {err}");
                    Removal::Failed
                }
            },
            None => {
                log::error!("no card at index {index} to remove");
                Removal::AlreadyGone
            }
        };
        self.drain_history();
        removal
    }

    /// Give up on a removal the history never confirmed.
    ///
    /// Timeouts from an earlier deletion and timeouts that fire while the
    /// fragments are still flying are ignored. Returns true if the card was
    /// restored.
    pub fn on_removal_timeout(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.phase() == Some(SessionPhase::Running) {
            return false;
        }
        if !self.deck.force_restore() {
            return false;
        }
        self.teardown_engine();
        true
    }

    /// Apply pending history notifications. Returns true if any arrived.
    pub fn drain_history(&mut self) -> bool {
        let mut changed = false;
        while let Ok(HistoryChanged { len }) = self.history_events.try_recv() {
            match self.history.list() {
                Ok(cards) => self.cards = cards,
                Err(err) => log::error!("failed to reload cards: {err}"),
            }
            self.deck.on_length_changed(len);
            changed = true;
        }

        if changed && self.deck.session().is_none() {
            self.teardown_engine();
        }
        changed
    }

    /// Stop the effect if it still runs and show the card surface again
    fn teardown_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.cancel();
            log::debug!("disintegration torn down in state {:?}", engine.state());
        }
    }

    /// Store a new card and focus it
    pub fn append(&mut self, artifact: Artifact) -> rusqlite::Result<CardRecord> {
        let record = self.history.append(artifact)?;
        self.drain_history();
        if self.deck.session().is_none() {
            self.deck = Deck::new(self.cards.len(), self.layout);
        }
        Ok(record)
    }

    /// Remove every card. Returns how many were deleted.
    pub fn clear(&mut self) -> rusqlite::Result<usize> {
        let count = self.history.clear()?;
        self.drain_history();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::{CaptureError, SurfaceRect};
    use image::{Rgba, RgbaImage};
    use std::cell::Cell;
    use std::rc::Rc;

    struct FixtureSurface {
        bitmap: Option<RgbaImage>,
        visible: Rc<Cell<bool>>,
    }

    impl Surface for FixtureSurface {
        fn bounds(&self) -> SurfaceRect {
            SurfaceRect::new(470.0, 120.0, 90.0, 140.0)
        }

        fn rasterize(&self) -> Result<RgbaImage, CaptureError> {
            self.bitmap.clone().ok_or(CaptureError::EmptyBitmap)
        }

        fn set_visible(&mut self, visible: bool) {
            self.visible.set(visible);
        }
    }

    fn surface(captured: bool) -> (FixtureSurface, Rc<Cell<bool>>) {
        let visible = Rc::new(Cell::new(true));
        let bitmap = captured.then(|| RgbaImage::from_pixel(90, 140, Rgba([40, 80, 120, 255])));
        let surface = FixtureSurface {
            bitmap,
            visible: visible.clone(),
        };
        (surface, visible)
    }

    fn artifact(title: &str) -> Artifact {
        Artifact {
            title: title.to_string(),
            subtitle: "SUB".to_string(),
            description: "desc".to_string(),
            image_url: None,
        }
    }

    fn snap() -> SnapConfig {
        SnapConfig {
            columns: 4,
            rows: 4,
            ..SnapConfig::default()
        }
    }

    /// Cards are appended oldest first, so the deck reads them back reversed
    fn board_with(mut history: History, titles: &[&str]) -> Board<FixtureSurface> {
        for title in titles {
            history.append(artifact(title)).unwrap();
        }
        Board::new(history, LayoutConfig::default(), snap())
    }

    fn board(titles: &[&str]) -> Board<FixtureSurface> {
        board_with(History::open_in_memory().unwrap(), titles)
    }

    fn titles(board: &Board<FixtureSurface>) -> Vec<&str> {
        board.cards().iter().map(|card| card.artifact.title.as_str()).collect()
    }

    fn run_to_end(board: &mut Board<FixtureSurface>) {
        for _ in 0..1_000 {
            if board.step() == StepOutcome::Completed {
                return;
            }
        }
        panic!("fragments never faded");
    }

    #[test]
    fn test_removal_ends_session_and_shows_surface() {
        let mut board = board(&["A", "B", "C"]);
        assert!(board.navigate(Command::Advance));
        assert_eq!(board.focused_record().unwrap().artifact.title, "B");

        let epoch = board.begin_deletion().unwrap();
        let (surface, visible) = surface(true);
        let outcome = board.start_disintegration(surface, XorShiftRng::with_seed(7));
        assert!(matches!(outcome, Some(StartOutcome::Running { .. })));
        assert!(!visible.get());
        assert!(board.drain_completions().is_none());

        run_to_end(&mut board);
        assert_eq!(
            board.drain_completions(),
            Some(Committed {
                epoch,
                removal: Removal::Removed
            })
        );
        assert!(board.deck().session().is_none());
        assert!(board.engine().is_none());
        assert!(visible.get());
        assert_eq!(titles(&board), ["C", "A"]);
        assert_eq!(board.deck().focused(), 1);

        // The restore timeout armed at commit arrives after the fact
        assert!(!board.on_removal_timeout(epoch));
        assert_eq!(titles(&board), ["C", "A"]);
    }

    #[test]
    fn test_failed_removal_is_restored_by_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let mut board = board_with(History::open(&path).unwrap(), &["A", "B", "C"]);
        board.navigate(Command::Advance);

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER pin_cards BEFORE DELETE ON cards
                 BEGIN SELECT RAISE(ABORT, 'pinned'); END;",
            )
            .unwrap();

        let epoch = board.begin_deletion().unwrap();
        let (surface, visible) = surface(true);
        board.start_disintegration(surface, XorShiftRng::with_seed(7));
        run_to_end(&mut board);

        assert_eq!(
            board.drain_completions(),
            Some(Committed {
                epoch,
                removal: Removal::Failed
            })
        );
        assert_eq!(board.deck().session().map(|s| s.phase), Some(SessionPhase::Complete));
        assert!(!visible.get());

        assert!(board.on_removal_timeout(epoch));
        assert!(board.deck().session().is_none());
        assert!(board.engine().is_none());
        assert!(visible.get());
        assert_eq!(board.deck().focused(), 1);
        assert_eq!(titles(&board), ["C", "B", "A"]);
    }

    #[test]
    fn test_stale_timeout_is_ignored() {
        let mut board = board(&["A", "B"]);

        // A capture that never came back is restored by its own timeout
        let first = board.begin_deletion().unwrap();
        assert!(board.on_removal_timeout(first));
        assert!(board.deck().session().is_none());

        let second = board.begin_deletion().unwrap();
        assert_ne!(first, second);
        assert!(!board.on_removal_timeout(first));
        assert!(board.is_capturing());
        assert!(board.on_removal_timeout(second));
    }

    #[test]
    fn test_timeout_waits_for_running_animation() {
        let mut board = board(&["A"]);
        let epoch = board.begin_deletion().unwrap();
        let (surface, visible) = surface(true);
        board.start_disintegration(surface, XorShiftRng::with_seed(7));
        board.step();

        assert!(!board.on_removal_timeout(epoch));
        assert_eq!(board.deck().session().map(|s| s.phase), Some(SessionPhase::Running));
        assert!(board.is_animating());
        assert!(!visible.get());
        assert_eq!(titles(&board), ["A"]);
    }

    #[test]
    fn test_failed_capture_still_deletes() {
        let mut board = board(&["A", "B"]);
        let epoch = board.begin_deletion().unwrap();
        let (surface, visible) = surface(false);

        let outcome = board.start_disintegration(surface, XorShiftRng::with_seed(7));
        assert!(matches!(outcome, Some(StartOutcome::Fallback(CaptureError::EmptyBitmap))));
        assert_eq!(
            board.drain_completions(),
            Some(Committed {
                epoch,
                removal: Removal::Removed
            })
        );
        assert!(visible.get());
        assert_eq!(titles(&board), ["A"]);
        assert!(board.deck().session().is_none());
    }

    #[test]
    fn test_new_card_mid_animation_cancels_effect() {
        let mut board = board(&["A", "B"]);
        let epoch = board.begin_deletion().unwrap();
        let (surface, visible) = surface(true);
        board.start_disintegration(surface, XorShiftRng::with_seed(7));
        board.step();

        board.append(artifact("C")).unwrap();
        assert!(board.deck().session().is_none());
        assert!(board.engine().is_none());
        assert!(visible.get());
        assert_eq!(titles(&board), ["C", "B", "A"]);
        assert_eq!(board.deck().focused(), 0);

        // The cancelled run never reports completion
        assert!(board.drain_completions().is_none());
        assert!(!board.on_removal_timeout(epoch));
    }

    #[test]
    fn test_capture_without_pending_deletion_is_dropped() {
        let mut board = board(&["A"]);
        let (surface, _) = surface(true);
        assert!(board.start_disintegration(surface, XorShiftRng::with_seed(7)).is_none());
        assert!(board.engine().is_none());
    }

    #[test]
    fn test_clear_empties_deck() {
        let mut board = board(&["A", "B"]);
        assert_eq!(board.clear().unwrap(), 2);
        assert!(board.cards().is_empty());
        assert!(board.deck().is_empty());
        assert!(board.begin_deletion().is_none());
    }
}
