use iced::widget::{button, canvas, column, container, row, stack, text, text_input, vertical_space};
use iced::window::{self, Screenshot};
use iced::{Alignment, Element, Length, Size, Subscription, Task, Theme};
use image::RgbaImage;
use rfd::FileDialog;
use std::time::Instant;

mod board;
mod config;
mod deck;
mod error;
mod logging;
mod snap;
mod source;
mod state;
mod ui;

use board::{Board, Committed, Removal};
use config::DeckConfig;
use deck::gesture::{self, Command, Elasticity, WheelGate};
use deck::SlotKey;
use snap::rng::XorShiftRng;
use snap::{CaptureError, StartOutcome, SurfaceRect};
use source::{OfflineSource, SourceError};
use state::data::Artifact;
use state::history::History;
use ui::stage::{self, CardContent, Debris, ExportCard, ExportLayout, Stage, StageCard, CARD_RADIUS, EXPORT_SCALE};
use ui::surface::{self, CardSurface, SurfaceVisibility, WindowFrame};
use ui::tween::TweenBank;

const INITIAL_WINDOW: Size = Size::new(1280.0, 800.0);

/// Actions that wait for a yes/no from the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirm {
    DeleteCard,
    ClearAll,
}

/// Main application state
struct ConceptDeck {
    config: DeckConfig,
    /// Cards, navigation and deletions, backed by the card database
    board: Board<CardSurface>,
    tweens: TweenBank,
    wheel: WheelGate,
    visibility: SurfaceVisibility,
    viewport: Size,
    concept: String,
    generating: bool,
    confirm: Option<Confirm>,
    /// The focused card is laid out for a download capture
    exporting: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Animation frame while anything moves
    Frame(Instant),
    WindowResized(Size),
    /// The focused card was dragged and let go
    DragReleased { offset: f32, velocity: f32 },
    /// Horizontal wheel delta, positive when scrolling right
    Wheel(f32),
    /// A card was clicked
    CardSelected(isize),
    ShowNewer,
    ShowOlder,
    DeleteRequested,
    ClearRequested,
    ConfirmAccepted,
    ConfirmDismissed,
    /// Window contents captured for the card about to disintegrate
    SurfaceCaptured(Screenshot),
    /// The history did not confirm a removal in time
    RemovalTimedOut(u64),
    DownloadRequested,
    DownloadCaptured(Screenshot),
    ConceptChanged(String),
    Generate,
    Generated(Result<Artifact, SourceError>),
}

impl ConceptDeck {
    /// Create a new instance of the application
    fn new(config: DeckConfig) -> (Self, Task<Message>) {
        // The app cannot function without its history
        let history = History::open_default()
            .expect("Failed to open the card history. Check permissions and disk space.");
        let board = Board::new(history, config.layout, config.snap);
        let count = board.cards().len();
        log::info!("🃏 Concept Deck initialized with {count} cards");

        let mut app = ConceptDeck {
            wheel: WheelGate::new(&config.gestures),
            status: format!("{count} cards in your deck."),
            config,
            board,
            tweens: TweenBank::new(),
            visibility: SurfaceVisibility::new(),
            viewport: INITIAL_WINDOW,
            concept: String::new(),
            generating: false,
            confirm: None,
            exporting: false,
        };
        app.sync_tweens();

        let measure = window::get_oldest()
            .and_then(window::get_size)
            .map(Message::WindowResized);
        (app, measure)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Frame(now) => {
                self.board.step();
                self.tweens.tick(now);
                self.drain_completions()
            }
            Message::WindowResized(size) => {
                self.viewport = size;
                self.sync_tweens();
                Task::none()
            }
            Message::DragReleased { offset, velocity } => {
                if let Some(command) = gesture::drag_release(offset, velocity, &self.config.gestures) {
                    self.navigate(command);
                }
                Task::none()
            }
            Message::Wheel(delta_x) => {
                if let Some(command) = self.wheel.on_wheel(delta_x, Instant::now()) {
                    self.navigate(command);
                }
                Task::none()
            }
            Message::CardSelected(index) => {
                if let Some(command) = gesture::select(index, self.board.deck().focused()) {
                    self.navigate(command);
                }
                Task::none()
            }
            Message::ShowNewer => {
                self.navigate(Command::Retreat);
                Task::none()
            }
            Message::ShowOlder => {
                self.navigate(Command::Advance);
                Task::none()
            }
            Message::DeleteRequested => {
                if self.can_act_on_card() {
                    self.confirm = Some(Confirm::DeleteCard);
                }
                Task::none()
            }
            Message::ClearRequested => {
                if self.board.deck().session().is_none() && !self.board.cards().is_empty() {
                    self.confirm = Some(Confirm::ClearAll);
                }
                Task::none()
            }
            Message::ConfirmDismissed => {
                self.confirm = None;
                Task::none()
            }
            Message::ConfirmAccepted => match self.confirm.take() {
                Some(Confirm::DeleteCard) => self.begin_deletion(),
                Some(Confirm::ClearAll) => {
                    self.clear_all();
                    Task::none()
                }
                None => Task::none(),
            },
            Message::SurfaceCaptured(screenshot) => self.start_disintegration(screenshot),
            Message::RemovalTimedOut(epoch) => {
                // A running animation re-arms the timeout when it completes
                if self.board.on_removal_timeout(epoch) {
                    self.status = "⚠️ The card could not be deleted.".to_string();
                    self.sync_tweens();
                }
                Task::none()
            }
            Message::DownloadRequested => {
                if self.can_act_on_card() {
                    // The next frame shows the whole card on its own
                    self.exporting = true;
                    capture_window(Message::DownloadCaptured)
                } else {
                    Task::none()
                }
            }
            Message::DownloadCaptured(screenshot) => {
                self.exporting = false;
                self.download(screenshot);
                Task::none()
            }
            Message::ConceptChanged(concept) => {
                self.concept = concept;
                Task::none()
            }
            Message::Generate => {
                let concept = self.concept.trim().to_string();
                if concept.is_empty() || self.generating || self.board.deck().session().is_some() {
                    return Task::none();
                }
                self.generating = true;
                self.status = format!("Drawing a card for \"{concept}\"...");
                Task::perform(
                    source::generate_async(OfflineSource, concept),
                    Message::Generated,
                )
            }
            Message::Generated(result) => {
                self.generating = false;
                match result {
                    Ok(artifact) => self.add_card(artifact),
                    Err(SourceError::EmptyConcept) => {}
                    Err(err) => {
                        log::error!("generation failed: {err}");
                        self.status = format!("⚠️ {err}");
                    }
                }
                Task::none()
            }
        }
    }

    fn navigate(&mut self, command: Command) {
        if self.board.navigate(command) {
            self.sync_tweens();
        }
    }

    /// Download and delete act on a real, settled card
    fn can_act_on_card(&self) -> bool {
        let deck = self.board.deck();
        deck.focused_card().is_some() && deck.session().is_none() && !self.generating && !self.exporting
    }

    fn card_size(&self) -> Size {
        let (width, height) = self.config.layout.card_size(self.viewport.width);
        Size::new(width, height)
    }

    /// Re-target every mounted card after the deck or the viewport changed
    fn sync_tweens(&mut self) {
        if self.tweens.is_settled() {
            self.tweens.pause();
        }
        let slots = self.board.render(self.viewport.width);
        self.tweens.sync(&slots, Instant::now());
    }

    /// Screen rectangle of the focused card as currently drawn
    fn focused_rect(&self) -> Option<SurfaceRect> {
        let key = SlotKey::Card(self.board.focused_record()?.id);
        let transform = self.tweens.current(&key)?;
        stage::card_rect(self.viewport, self.card_size(), &transform)
    }

    /// Crop the focused card out of a window screenshot
    fn capture_focused(&self, screenshot: &Screenshot) -> (SurfaceRect, Result<RgbaImage, CaptureError>) {
        let Some(rect) = self.focused_rect() else {
            return (SurfaceRect::new(0.0, 0.0, 0.0, 0.0), Err(CaptureError::EmptySurface));
        };
        let frame = WindowFrame::from_screenshot(screenshot, self.viewport.width);
        let radius = CARD_RADIUS * frame.scale;
        let bitmap = frame.crop(rect).map(|mut bitmap| {
            surface::mask_rounded_corners(&mut bitmap, radius);
            bitmap
        });
        (rect, bitmap)
    }

    fn begin_deletion(&mut self) -> Task<Message> {
        if self.generating {
            return Task::none();
        }
        match self.board.begin_deletion() {
            // The timeout also covers a capture that never comes back
            Some(epoch) => Task::batch([
                capture_window(Message::SurfaceCaptured),
                self.removal_timeout(epoch),
            ]),
            None => Task::none(),
        }
    }

    fn start_disintegration(&mut self, screenshot: Screenshot) -> Task<Message> {
        if !self.board.is_capturing() {
            return Task::none();
        }

        let (rect, bitmap) = self.capture_focused(&screenshot);
        let surface = CardSurface::new(rect, bitmap, self.visibility.clone());
        match self.board.start_disintegration(surface, XorShiftRng::from_clock()) {
            Some(StartOutcome::Running { particles }) => {
                log::info!("💥 Card disintegrating into {particles} fragments");
            }
            Some(StartOutcome::Fallback(err)) => {
                self.status = format!("⚠️ Could not capture the card ({err}); deleting it anyway.");
            }
            Some(StartOutcome::AlreadyStarted) | None => {}
        }
        self.sync_tweens();

        self.drain_completions()
    }

    /// Commit finished disintegrations and arm their restore timeouts
    fn drain_completions(&mut self) -> Task<Message> {
        let Some(Committed { epoch, removal }) = self.board.drain_completions() else {
            return Task::none();
        };
        if removal == Removal::Removed {
            self.status = "🗑️ Card deleted.".to_string();
        }
        self.sync_tweens();
        self.removal_timeout(epoch)
    }

    fn removal_timeout(&self, epoch: u64) -> Task<Message> {
        let timeout = self.config.removal_timeout();
        Task::perform(tokio::time::sleep(timeout), move |_| Message::RemovalTimedOut(epoch))
    }

    fn add_card(&mut self, artifact: Artifact) {
        match self.board.append(artifact) {
            Ok(record) => {
                self.status = format!("✨ Added \"{}\".", record.artifact.title);
                self.concept.clear();
            }
            Err(err) => {
                log::error!("failed to store card: {err}");
                self.status = format!("⚠️ {err}");
            }
        }
        self.sync_tweens();
    }

    fn clear_all(&mut self) {
        if self.board.deck().session().is_some() {
            return;
        }
        match self.board.clear() {
            Ok(count) => self.status = format!("🧹 Removed {count} cards."),
            Err(err) => {
                log::error!("failed to clear history: {err}");
                self.status = format!("⚠️ {err}");
            }
        }
        self.sync_tweens();
    }

    fn export_card(&self) -> Option<ExportCard<'_>> {
        let record = self.board.focused_record()?;
        Some(ExportCard {
            record,
            layout: ExportLayout::new(self.viewport, self.card_size(), record),
        })
    }

    fn download(&mut self, screenshot: Screenshot) {
        let Some(export) = self.export_card() else {
            return;
        };
        let file_name = export.record.download_name();

        let frame = WindowFrame::from_screenshot(&screenshot, self.viewport.width);
        let layout = export.layout;
        let captured = frame.crop_resized(layout.rect, layout.output_size(), CARD_RADIUS * EXPORT_SCALE);
        let bitmap = match captured {
            Ok(bitmap) => bitmap,
            Err(err) => {
                log::warn!("download capture failed: {err}");
                self.status = format!("⚠️ Could not capture the card: {err}");
                return;
            }
        };

        let Some(path) = FileDialog::new()
            .set_title("Save Card")
            .set_file_name(&file_name)
            .add_filter("PNG image", &["png"])
            .save_file()
        else {
            return;
        };

        self.status = match surface::save_png(&bitmap, &path) {
            Ok(()) => {
                log::info!("💾 Saved card to {}", path.display());
                format!("💾 Saved {}", path.display())
            }
            Err(err) => {
                log::error!("failed to save card: {err}");
                format!("⚠️ {err}")
            }
        };
    }

    fn is_animating(&self) -> bool {
        self.board.is_animating() || !self.tweens.is_settled()
    }

    fn subscription(&self) -> Subscription<Message> {
        let resize = window::resize_events().map(|(_id, size)| Message::WindowResized(size));
        if self.is_animating() {
            Subscription::batch([resize, window::frames().map(Message::Frame)])
        } else {
            resize
        }
    }

    fn stage(&self) -> Stage<'_> {
        let deck = self.board.deck();
        let cards = self
            .board
            .render(self.viewport.width)
            .into_iter()
            .map(|slot| StageCard {
                index: slot.index,
                role: slot.role,
                transform: self.tweens.current(&slot.key).unwrap_or(slot.transform),
                content: match slot.key {
                    SlotKey::Card(_) => self
                        .board
                        .cards()
                        .get(slot.index as usize)
                        .map_or(CardContent::Empty, CardContent::Card),
                    SlotKey::NewestBoundary => CardContent::NewestBoundary,
                    SlotKey::OldestBoundary => CardContent::OldestBoundary,
                    SlotKey::Empty => CardContent::Empty,
                },
            })
            .collect();

        let debris = self.board.engine().and_then(|engine| {
            engine.overlay().map(|overlay| Debris {
                overlay,
                particles: engine.particles(),
            })
        });

        Stage {
            cards,
            card_size: self.card_size(),
            surface_visible: self.visibility.is_visible(),
            debris,
            empty_underlay: deck.is_sole_card_deletion(),
            elasticity: Elasticity::for_index(deck.focused(), deck.len()),
            interactive: deck.session().is_none() && !deck.is_empty() && !self.exporting,
            export: self.exporting.then(|| self.export_card()).flatten(),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let stage_view = canvas(self.stage()).width(Length::Fill).height(Length::Fill);
        if self.exporting {
            return stage_view.into();
        }

        let deck = self.board.deck();
        let idle = deck.session().is_none();
        let can_generate = idle && !self.generating && !self.concept.trim().is_empty();

        let generator = row![
            text_input("Type a concept...", &self.concept)
                .on_input(Message::ConceptChanged)
                .on_submit(Message::Generate)
                .padding(10)
                .width(Length::Fixed(360.0)),
            button("Generate")
                .on_press_maybe(can_generate.then_some(Message::Generate))
                .padding(10),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let mut controls = column![generator, vertical_space()]
            .spacing(16)
            .padding(24)
            .align_x(Alignment::Center)
            .width(Length::Fill)
            .height(Length::Fill);

        if let Some(confirm) = self.confirm {
            let (prompt, accept) = match confirm {
                Confirm::DeleteCard => ("Have you digested this concept? Delete it for good.", "Delete"),
                Confirm::ClearAll => ("Delete every card in the deck?", "Clear all"),
            };
            controls = controls.push(
                row![
                    text(prompt).size(16),
                    button(accept).on_press(Message::ConfirmAccepted).padding(10),
                    button("Keep").on_press(Message::ConfirmDismissed).padding(10),
                ]
                .spacing(12)
                .align_y(Alignment::Center),
            );
        }

        // Actions disappear while the last card disintegrates
        if !deck.is_sole_card_deletion() {
            let on_card = self.can_act_on_card();
            let focused = deck.focused();
            let len = deck.len() as isize;

            controls = controls.push(
                row![
                    button("◀")
                        .on_press_maybe((idle && len > 0 && focused > -1).then_some(Message::ShowNewer))
                        .padding(10),
                    button("Download")
                        .on_press_maybe(on_card.then_some(Message::DownloadRequested))
                        .padding(10),
                    button("Delete")
                        .on_press_maybe(on_card.then_some(Message::DeleteRequested))
                        .padding(10),
                    button("Clear all")
                        .on_press_maybe((idle && len > 0).then_some(Message::ClearRequested))
                        .padding(10),
                    button("▶")
                        .on_press_maybe((idle && len > 0 && focused < len).then_some(Message::ShowOlder))
                        .padding(10),
                ]
                .spacing(12)
                .align_y(Alignment::Center),
            );
        }

        controls = controls.push(text(&self.status).size(14));

        stack![
            stage_view,
            container(controls).width(Length::Fill).height(Length::Fill),
        ]
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Screenshot the main window on the next frame
fn capture_window(on_capture: fn(Screenshot) -> Message) -> Task<Message> {
    window::get_oldest()
        .and_then(window::screenshot)
        .map(on_capture)
}

fn main() -> iced::Result {
    let config = DeckConfig::load();
    if let Err(err) = logging::init(&config.log_level) {
        eprintln!("⚠️  {err}");
    }

    iced::application("Concept Deck", ConceptDeck::update, ConceptDeck::view)
        .subscription(ConceptDeck::subscription)
        .theme(ConceptDeck::theme)
        .window_size(INITIAL_WINDOW)
        .centered()
        .run_with(move || ConceptDeck::new(config))
}
