/// Card deck navigation
///
/// The deck owns the focused position over a virtual sequence of `len + 2`
/// slots: the newest-boundary sentinel at index -1, the real cards at
/// `0..len` (0 is the newest card), and the oldest-boundary sentinel at
/// index `len`. It turns commands into index changes, lays out the cards
/// around the focus, and choreographs a deletion until the history confirms
/// that the card is gone.
///
/// Rejected commands are silent no-ops; hugging a boundary is normal use.

pub mod gesture;
pub mod transform;

pub use gesture::{Command, Elasticity};
pub use transform::{card_transform, CardTransform, TransformInput};

use crate::config::LayoutConfig;
use crate::state::data::CardId;

/// Identity of a rendered slot, stable across index shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Card(CardId),
    /// Placeholder before the newest card
    NewestBoundary,
    /// Placeholder after the oldest card
    OldestBoundary,
    /// The only slot of an empty deck
    Empty,
}

/// What a slot is doing in the current choreography
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Focused,
    /// The focused card while it disintegrates
    Deleting,
    /// The neighbour sliding into the vacated slot
    Incoming,
    Neighbor,
}

/// One mounted card and its target pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSlot {
    pub key: SlotKey,
    /// Virtual index in `[-1, len]`
    pub index: isize,
    /// Signed distance from the focused index
    pub offset: i32,
    pub role: SlotRole,
    pub transform: CardTransform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the card to be captured
    Capturing,
    /// Fragments are in flight
    Running,
    /// Animation finished, waiting for the history to drop the card
    Complete,
}

/// A deletion in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionSession {
    /// Index of the card being deleted, frozen at start
    pub target: usize,
    /// Deck length when the session started
    pub len_at_start: usize,
    pub phase: SessionPhase,
}

/// Permission to start disintegrating the focused card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteTicket {
    pub target: usize,
}

/// Ask the history to drop the card at `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalRequest {
    pub index: usize,
}

/// Navigation state machine for the card stack
#[derive(Debug, Clone)]
pub struct Deck {
    len: usize,
    focused: isize,
    session: Option<DeletionSession>,
    layout: LayoutConfig,
}

impl Deck {
    /// A deck of `len` cards focused on the newest card
    pub fn new(len: usize, layout: LayoutConfig) -> Self {
        Self {
            len,
            focused: 0,
            session: None,
            layout,
        }
    }

    /// A deck focused on `focused`, clamped into range
    #[cfg(test)]
    pub fn with_focus(len: usize, focused: isize, layout: LayoutConfig) -> Self {
        let mut deck = Self::new(len, layout);
        deck.focused = deck.clamp(focused);
        deck
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn focused(&self) -> isize {
        self.focused
    }

    /// Index of the focused real card, `None` on a sentinel
    pub fn focused_card(&self) -> Option<usize> {
        (self.focused >= 0 && (self.focused as usize) < self.len).then_some(self.focused as usize)
    }

    pub fn session(&self) -> Option<&DeletionSession> {
        self.session.as_ref()
    }

    /// True once fragments are visible and until the session ends
    pub fn is_disintegrating(&self) -> bool {
        matches!(
            self.session,
            Some(DeletionSession {
                phase: SessionPhase::Running | SessionPhase::Complete,
                ..
            })
        )
    }

    /// The card going away is the last one in the deck
    pub fn is_sole_card_deletion(&self) -> bool {
        self.is_disintegrating() && self.len == 1
    }

    fn clamp(&self, index: isize) -> isize {
        if self.len == 0 {
            0
        } else {
            index.clamp(-1, self.len as isize)
        }
    }

    fn navigation_locked(&self) -> bool {
        self.session.is_some() || self.len == 0
    }

    fn render_radius(&self) -> isize {
        if self.is_disintegrating() {
            2
        } else {
            1
        }
    }

    /// Move towards the oldest end
    pub fn advance(&mut self) -> bool {
        if self.navigation_locked() || self.focused >= self.len as isize {
            return false;
        }
        self.focused += 1;
        true
    }

    /// Move towards the newest end
    pub fn retreat(&mut self) -> bool {
        if self.navigation_locked() || self.focused <= -1 {
            return false;
        }
        self.focused -= 1;
        true
    }

    /// Focus a card that is currently rendered but not focused
    pub fn jump_to(&mut self, index: isize) -> bool {
        let in_window = (index - self.focused).abs() <= self.render_radius();
        if self.navigation_locked() || index == self.focused || !in_window {
            return false;
        }
        if index < -1 || index > self.len as isize {
            return false;
        }
        self.focused = index;
        true
    }

    /// Apply a normalized gesture
    pub fn apply(&mut self, command: Command) -> bool {
        let changed = match command {
            Command::Advance => self.advance(),
            Command::Retreat => self.retreat(),
            Command::JumpTo(index) => self.jump_to(index),
        };
        if changed {
            log::debug!("{command:?} -> focus {}", self.focused);
        }
        changed
    }

    /// Start deleting the focused card.
    ///
    /// Only a real card can be deleted and only one deletion runs at a time.
    pub fn request_delete(&mut self) -> Option<DeleteTicket> {
        if self.session.is_some() {
            return None;
        }
        let target = self.focused_card()?;

        self.session = Some(DeletionSession {
            target,
            len_at_start: self.len,
            phase: SessionPhase::Capturing,
        });
        log::info!("deletion of card {target} requested");
        Some(DeleteTicket { target })
    }

    /// The card was captured and its fragments are flying
    pub fn on_disintegration_started(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) if session.phase == SessionPhase::Capturing => {
                session.phase = SessionPhase::Running;
                true
            }
            _ => false,
        }
    }

    /// Every fragment has faded (or capture failed).
    ///
    /// Yields the removal request once; the session stays alive until the
    /// history reports a different length.
    pub fn on_disintegration_complete(&mut self) -> Option<RemovalRequest> {
        let session = self.session.as_mut()?;
        if session.phase == SessionPhase::Complete {
            return None;
        }
        session.phase = SessionPhase::Complete;
        Some(RemovalRequest {
            index: session.target,
        })
    }

    /// Reconcile with the history's current length.
    ///
    /// Safe to call repeatedly with the same value.
    pub fn on_length_changed(&mut self, new_len: usize) {
        let torn_down = match self.session {
            Some(session) if session.len_at_start != new_len => {
                self.session = None;
                log::info!("deletion of card {} committed", session.target);
                true
            }
            _ => false,
        };

        self.len = new_len;
        self.focused = if new_len == 0 {
            0
        } else if torn_down && self.focused >= new_len as isize {
            // The deleted card was the oldest; its newer neighbour takes the centre
            new_len as isize - 1
        } else {
            self.clamp(self.focused)
        };
    }

    /// Abandon a deletion whose removal never landed.
    ///
    /// The focus stays where it was; the caller restores the card surface.
    pub fn force_restore(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                log::warn!(
                    "deletion of card {} timed out waiting for the history; restoring",
                    session.target
                );
                true
            }
            None => false,
        }
    }

    /// Lay out the window of cards around the focus.
    ///
    /// `ids` is the current card order (newest first); sentinel slots are
    /// added at both ends.
    pub fn render(&self, ids: &[CardId], viewport_width: f32) -> Vec<RenderSlot> {
        if self.len == 0 {
            return vec![RenderSlot {
                key: SlotKey::Empty,
                index: 0,
                offset: 0,
                role: SlotRole::Focused,
                transform: card_transform(&TransformInput::resting(0, viewport_width), &self.layout),
            }];
        }

        let len = self.len as isize;
        let deleting = self.is_disintegrating();
        let sole = self.is_sole_card_deletion();
        let oldest = deleting && self.focused == len - 1;
        let incoming_offset = if oldest { -1 } else { 1 };
        let radius = self.render_radius();

        let mut slots = Vec::with_capacity((radius * 2 + 1) as usize);
        for index in (self.focused - radius)..=(self.focused + radius) {
            if index < -1 || index > len {
                continue;
            }

            let is_sentinel = index == -1 || index == len;
            if sole && is_sentinel {
                continue;
            }

            let key = if index == -1 {
                SlotKey::NewestBoundary
            } else if index == len {
                SlotKey::OldestBoundary
            } else {
                match ids.get(index as usize) {
                    Some(id) => SlotKey::Card(*id),
                    None => continue,
                }
            };

            let offset = (index - self.focused) as i32;
            let incoming = deleting && !sole && offset == incoming_offset;
            let role = if offset == 0 {
                if deleting {
                    SlotRole::Deleting
                } else {
                    SlotRole::Focused
                }
            } else if incoming {
                SlotRole::Incoming
            } else {
                SlotRole::Neighbor
            };

            let input = TransformInput {
                offset,
                deleting,
                oldest_card_deletion: oldest,
                incoming_neighbor: incoming,
                sole_card_deletion: sole,
                viewport_width,
            };

            slots.push(RenderSlot {
                key,
                index,
                offset,
                role,
                transform: card_transform(&input, &self.layout),
            });
        }
        slots
    }
}
