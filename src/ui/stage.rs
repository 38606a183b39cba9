/// The card stage: draws the projected deck and turns raw pointer input
/// into deck messages
use std::time::Instant;

use iced::alignment;
use iced::font::Weight;
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Frame, Path, Program, Stroke};
use iced::{Color, Font, Pixels, Point, Rectangle, Renderer, Size, Theme, Vector};

use super::projection::{self, Quad};
use crate::deck::{CardTransform, Elasticity, SlotRole};
use crate::snap::particle::Particle;
use crate::snap::{Overlay, SurfaceRect};
use crate::state::data::CardRecord;
use crate::Message;

/// Corner radius of a card, in unscaled card pixels
pub const CARD_RADIUS: f32 = 24.0;
/// Pointer travel below which a press counts as a tap
const TAP_SLOP: f32 = 6.0;
/// Pixels per wheel line for mice that report lines
const WHEEL_LINE_PX: f32 = 40.0;
/// Darkening of cards that are not focused
const DIM_ALPHA: f32 = 0.3;
/// Downloads are saved at this multiple of the card's own size
pub const EXPORT_SCALE: f32 = 2.0;
/// Gap between a card laid out for download and the window edges
const EXPORT_MARGIN: f32 = 16.0;

// Vertical layout of a record card, in fractions of the standard card height
const ART_BOTTOM: f32 = 0.4;
const TITLE_TOP: f32 = 0.44;
const SUBTITLE_TOP: f32 = 0.51;
const RULE_Y: f32 = 0.56;
const DESCRIPTION_TOP: f32 = 0.6;
const DESCRIPTION_LINE: f32 = 0.04;
const DESCRIPTION_MAX_LINES: usize = 9;
const FOOTER_HEIGHT: f32 = 0.1;

/// What is printed on a card
#[derive(Debug, Clone, Copy)]
pub enum CardContent<'a> {
    Card(&'a CardRecord),
    NewestBoundary,
    OldestBoundary,
    Empty,
}

/// One card as the stage draws it
#[derive(Debug, Clone, Copy)]
pub struct StageCard<'a> {
    pub index: isize,
    pub role: SlotRole,
    /// Current (tweened) pose
    pub transform: CardTransform,
    pub content: CardContent<'a>,
}

/// Fragments of the card being deleted
#[derive(Debug, Clone, Copy)]
pub struct Debris<'a> {
    pub overlay: Overlay,
    pub particles: &'a [Particle],
}

/// A card laid out flat and unclipped, with the whole description and a
/// footer, so the window can be captured for a download
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportLayout {
    /// Where the card is drawn, in stage coordinates
    pub rect: SurfaceRect,
    /// Standard card size on the stage
    pub card: Size,
    /// Full size of the card being exported
    pub size: Size,
    /// Shrink applied so the card fits in the window
    pub fit: f32,
}

impl ExportLayout {
    pub fn new(viewport: Size, card: Size, record: &CardRecord) -> Self {
        let lines = description(record, card.width, usize::MAX).len();
        let content = DESCRIPTION_TOP + lines as f32 * DESCRIPTION_LINE + FOOTER_HEIGHT;
        let size = Size::new(card.width, card.height * content.max(1.0));

        let fit = ((viewport.width - 2.0 * EXPORT_MARGIN) / size.width)
            .min((viewport.height - 2.0 * EXPORT_MARGIN) / size.height)
            .clamp(0.1, 1.0);
        let (width, height) = (size.width * fit, size.height * fit);
        let origin = stage_origin(viewport);

        Self {
            rect: SurfaceRect::new(origin.x - width / 2.0, origin.y - height / 2.0, width, height),
            card,
            size,
            fit,
        }
    }

    /// Pixel size of the saved image
    pub fn output_size(&self) -> (u32, u32) {
        (
            (self.size.width * EXPORT_SCALE).round() as u32,
            (self.size.height * EXPORT_SCALE).round() as u32,
        )
    }
}

/// The focused card being captured for a download
#[derive(Debug, Clone, Copy)]
pub struct ExportCard<'a> {
    pub record: &'a CardRecord,
    pub layout: ExportLayout,
}

pub struct Stage<'a> {
    pub cards: Vec<StageCard<'a>>,
    pub card_size: Size,
    /// Whether the focused card's surface is painted
    pub surface_visible: bool,
    pub debris: Option<Debris<'a>>,
    /// Show the empty-deck message under the stack
    pub empty_underlay: bool,
    /// Drag resistance of the focused card
    pub elasticity: Elasticity,
    /// False while navigation is locked
    pub interactive: bool,
    /// When set, only this card is drawn
    pub export: Option<ExportCard<'a>>,
}

/// Centre of the untransformed focused card
pub fn stage_origin(viewport: Size) -> Point {
    Point::new(viewport.width / 2.0, viewport.height / 2.0)
}

/// Screen rectangle covered by a card in `transform`
pub fn card_rect(viewport: Size, card: Size, transform: &CardTransform) -> Option<SurfaceRect> {
    let quad = Quad::project(transform, card, stage_origin(viewport))?;
    let b = quad.bounds();
    Some(SurfaceRect::new(b.x, b.y, b.width, b.height))
}

impl<'a> Stage<'a> {
    /// Project every visible card, in paint order
    fn layout(&self, viewport: Size, displacement: f32) -> Vec<(StageCard<'a>, Quad)> {
        let origin = stage_origin(viewport);
        let mut cards: Vec<_> = self
            .cards
            .iter()
            .filter(|card| card.transform.opacity > 0.001)
            .filter(|card| card.role != SlotRole::Deleting || self.surface_visible)
            .filter_map(|card| {
                let mut transform = card.transform;
                if card.role == SlotRole::Focused {
                    transform.x += displacement;
                }
                Quad::project(&transform, self.card_size, origin).map(|quad| (*card, quad))
            })
            .collect();
        cards.sort_by_key(|(card, _)| card.transform.z_index);
        cards
    }

    /// Virtual index of the card under `point`
    fn hit(&self, viewport: Size, point: Point) -> Option<isize> {
        let items: Vec<_> = self
            .layout(viewport, 0.0)
            .into_iter()
            .map(|(card, quad)| (card.index, card.transform.z_index, quad))
            .collect();
        projection::topmost(&items, point)
    }

    fn focused_hit(&self, viewport: Size, point: Point) -> bool {
        self.layout(viewport, 0.0)
            .iter()
            .any(|(card, quad)| card.role == SlotRole::Focused && quad.contains(point))
    }
}

impl<'a> Program<Message> for Stage<'a> {
    type State = DragState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if !cursor.is_over(bounds) {
                    return (canvas::event::Status::Ignored, None);
                }
                // Positive means the content scrolls right
                let dx = match delta {
                    mouse::ScrollDelta::Lines { x, .. } => -x * WHEEL_LINE_PX,
                    mouse::ScrollDelta::Pixels { x, .. } => -x,
                };
                if dx != 0.0 {
                    return (canvas::event::Status::Captured, Some(Message::Wheel(dx)));
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    state.press_position = Some(pos);
                    state.last_sample = Some((pos, Instant::now()));
                    state.grabbed_focused = self.interactive && self.focused_hit(bounds.size(), pos);
                    state.is_dragging = false;
                    state.displacement = 0.0;
                    state.velocity = 0.0;
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let (Some(press), Some(pos)) = (state.press_position, cursor.position_from(bounds.position())) else {
                    return (canvas::event::Status::Ignored, None);
                };

                let dx = pos.x - press.x;
                if dx.abs() > TAP_SLOP {
                    state.is_dragging = true;
                }

                if state.grabbed_focused {
                    let now = Instant::now();
                    if let Some((last, at)) = state.last_sample {
                        let dt = now.saturating_duration_since(at).as_secs_f32();
                        if dt > 0.0 {
                            let sample = (pos.x - last.x) / dt;
                            state.velocity = state.velocity * 0.2 + sample * 0.8;
                        }
                    }
                    state.last_sample = Some((pos, now));
                    state.displacement = self.elasticity.apply(dx);
                    state.drag_offset = dx;
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let Some(press) = state.press_position else {
                    return (canvas::event::Status::Ignored, None);
                };
                let message = if state.is_dragging {
                    state.grabbed_focused.then(|| Message::DragReleased {
                        offset: state.drag_offset,
                        velocity: state.velocity,
                    })
                } else if self.interactive {
                    self.hit(bounds.size(), press).map(Message::CardSelected)
                } else {
                    None
                };
                *state = DragState::default();
                return (canvas::event::Status::Captured, message);
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn draw(
        &self,
        state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());

        if let Some(export) = self.export {
            draw_export(&mut frame, &export);
            return vec![frame.into_geometry()];
        }

        if self.empty_underlay {
            draw_empty_message(&mut frame, stage_origin(bounds.size()), 1.0);
        }

        for (card, quad) in self.layout(bounds.size(), state.displacement) {
            draw_card(&mut frame, &card, &quad, self.card_size);
        }

        if let Some(debris) = self.debris {
            draw_debris(&mut frame, &debris);
        }

        vec![frame.into_geometry()]
    }

    fn mouse_interaction(&self, state: &Self::State, bounds: Rectangle, cursor: Cursor) -> mouse::Interaction {
        if state.grabbed_focused {
            return mouse::Interaction::Grabbing;
        }
        match cursor.position_in(bounds) {
            Some(pos) if self.interactive && self.focused_hit(bounds.size(), pos) => mouse::Interaction::Grab,
            Some(pos) if self.interactive && self.hit(bounds.size(), pos).is_some() => mouse::Interaction::Pointer,
            _ => mouse::Interaction::default(),
        }
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
    /// The press landed on the focused card
    pub grabbed_focused: bool,
    pub press_position: Option<Point>,
    pub last_sample: Option<(Point, Instant)>,
    /// Raw pointer travel since the press
    pub drag_offset: f32,
    /// Travel after elasticity, what the focused card is drawn with
    pub displacement: f32,
    /// Smoothed horizontal velocity, px/s
    pub velocity: f32,
}

fn with_alpha(color: Color, alpha: f32) -> Color {
    Color {
        a: color.a * alpha,
        ..color
    }
}

/// Muted colour for the illustration band, varied per card
fn art_color(seed: u8) -> Color {
    let hue = seed as f32 / 255.0 * 360.0;
    hsl(hue, 0.45, 0.72)
}

fn hsl(hue: f32, saturation: f32, lightness: f32) -> Color {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    Color::from_rgb(r + m, g + m, b + m)
}

/// Outline of a card-local rectangle, rounded at the chosen corners and
/// mapped through the projected quad
fn outline(quad: &Quad, card: Size, (u0, v0, u1, v1): (f32, f32, f32, f32), round_top: bool, round_bottom: bool) -> Path {
    const ARC_STEPS: usize = 6;
    let ru = CARD_RADIUS / card.width;
    let rv = CARD_RADIUS / card.height;

    // Corner centres clockwise from top-left, with the arc's start angle
    let corners = [
        (u0 + ru, v0 + rv, 180.0_f32, round_top),
        (u1 - ru, v0 + rv, 270.0, round_top),
        (u1 - ru, v1 - rv, 0.0, round_bottom),
        (u0 + ru, v1 - rv, 90.0, round_bottom),
    ];
    let square = [(u0, v0), (u1, v0), (u1, v1), (u0, v1)];

    let mut points = Vec::with_capacity(4 * (ARC_STEPS + 1));
    for (i, (cu, cv, start, rounded)) in corners.into_iter().enumerate() {
        if !rounded {
            points.push(quad.lerp(square[i].0, square[i].1));
            continue;
        }
        for step in 0..=ARC_STEPS {
            let angle = (start + 90.0 * step as f32 / ARC_STEPS as f32).to_radians();
            points.push(quad.lerp(cu + ru * angle.cos(), cv + rv * angle.sin()));
        }
    }

    Path::new(|builder| {
        if let Some((first, rest)) = points.split_first() {
            builder.move_to(*first);
            for point in rest {
                builder.line_to(*point);
            }
            builder.close();
        }
    })
}

fn draw_card(frame: &mut Frame, card: &StageCard<'_>, quad: &Quad, size: Size) {
    let alpha = card.transform.opacity;
    let body = outline(quad, size, (0.0, 0.0, 1.0, 1.0), true, true);

    let background = match card.content {
        CardContent::Card(_) => Color::WHITE,
        _ => Color::from_rgb8(0x18, 0x18, 0x1b),
    };
    frame.fill(&body, with_alpha(background, alpha));
    frame.stroke(
        &body,
        Stroke::default()
            .with_color(with_alpha(Color::from_rgb8(0x3f, 0x3f, 0x46), alpha))
            .with_width(1.0),
    );

    let text_scale = quad.depth_scale * card.transform.scale;
    match card.content {
        CardContent::Card(record) => draw_record(
            frame,
            record,
            RecordLayout {
                quad,
                size,
                base_height: size.height,
                text_scale,
                footer: false,
            },
            alpha,
        ),
        CardContent::NewestBoundary => draw_caption(
            frame,
            quad,
            text_scale,
            alpha,
            "Explore without limits",
            "New inspiration is on its way...",
        ),
        CardContent::OldestBoundary => draw_caption(
            frame,
            quad,
            text_scale,
            alpha,
            "Review the old, learn the new",
            "That was the last card!",
        ),
        CardContent::Empty => draw_empty_message(frame, quad.center(), alpha),
    }

    if card.role != SlotRole::Focused && card.role != SlotRole::Deleting {
        frame.fill(&body, Color::from_rgba(0.0, 0.0, 0.0, DIM_ALPHA * alpha));
    }
}

/// Where a record card is drawn and how much of it
struct RecordLayout<'q> {
    quad: &'q Quad,
    /// Card size in unscaled card pixels
    size: Size,
    /// Height of a standard card; layout fractions refer to it
    base_height: f32,
    text_scale: f32,
    /// Print the whole description and the footer
    footer: bool,
}

impl RecordLayout<'_> {
    /// Point at horizontal fraction `u`, `v` standard card heights down
    fn at(&self, u: f32, v: f32) -> Point {
        self.quad.lerp(u, v * self.base_height / self.size.height)
    }
}

fn description(record: &CardRecord, card_width: f32, max_lines: usize) -> Vec<String> {
    let chars_per_line = ((card_width * 0.86) / 7.5).max(8.0) as usize;
    wrap(&record.artifact.description, chars_per_line, max_lines)
}

fn draw_record(frame: &mut Frame, record: &CardRecord, layout: RecordLayout<'_>, alpha: f32) {
    let RecordLayout { quad, size, text_scale, .. } = layout;
    let art_bottom = ART_BOTTOM * layout.base_height / size.height;
    let art = outline(quad, size, (0.0, 0.0, 1.0, art_bottom), true, false);
    frame.fill(&art, with_alpha(art_color(record.id.hue_seed()), alpha));

    let glow = Path::circle(layout.at(0.72, 0.16), 48.0 * text_scale);
    frame.fill(&glow, Color::from_rgba(1.0, 1.0, 1.0, 0.35 * alpha));

    let ink = Color::from_rgb8(0x18, 0x18, 0x1b);
    let muted = Color::from_rgb8(0xa1, 0xa1, 0xaa);
    let chars_per_line = ((size.width * 0.86) / 7.5).max(8.0) as usize;

    let artifact = &record.artifact;
    let title = wrap(&artifact.title, chars_per_line / 2 + 4, 1);
    put_text(frame, title.concat(), layout.at(0.07, TITLE_TOP), 24.0 * text_scale, bold(), with_alpha(ink, alpha));
    put_text(
        frame,
        artifact.subtitle.clone(),
        layout.at(0.07, SUBTITLE_TOP),
        11.0 * text_scale,
        Font::DEFAULT,
        with_alpha(muted, alpha),
    );

    let bar = Path::new(|b| {
        b.move_to(layout.at(0.07, RULE_Y));
        b.line_to(layout.at(0.15, RULE_Y));
    });
    frame.stroke(&bar, Stroke::default().with_color(with_alpha(ink, alpha)).with_width(4.0 * text_scale));

    let max_lines = if layout.footer { usize::MAX } else { DESCRIPTION_MAX_LINES };
    for (row, line) in description(record, size.width, max_lines).into_iter().enumerate() {
        put_text(
            frame,
            line,
            layout.at(0.07, DESCRIPTION_TOP + row as f32 * DESCRIPTION_LINE),
            13.0 * text_scale,
            Font::DEFAULT,
            with_alpha(Color::from_rgb8(0x52, 0x52, 0x5b), alpha),
        );
    }

    if layout.footer {
        let top = size.height / layout.base_height - FOOTER_HEIGHT;
        let rule = Path::new(|b| {
            b.move_to(layout.at(0.07, top + 0.02));
            b.line_to(layout.at(0.93, top + 0.02));
        });
        frame.stroke(&rule, Stroke::default().with_color(with_alpha(muted, alpha)).with_width(text_scale));
        put_text(
            frame,
            "AI CONCEPT".to_string(),
            layout.at(0.07, top + 0.04),
            11.0 * text_scale,
            bold(),
            with_alpha(muted, alpha),
        );
    }
}

fn draw_export(frame: &mut Frame, export: &ExportCard<'_>) {
    let ExportLayout { rect, card, size, fit } = export.layout;
    let quad = Quad::flat(Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height)));
    let body = outline(&quad, size, (0.0, 0.0, 1.0, 1.0), true, true);
    frame.fill(&body, Color::WHITE);

    draw_record(
        frame,
        export.record,
        RecordLayout {
            quad: &quad,
            size,
            base_height: card.height,
            text_scale: fit,
            footer: true,
        },
        1.0,
    );
}

fn draw_caption(frame: &mut Frame, quad: &Quad, text_scale: f32, alpha: f32, heading: &str, body: &str) {
    let center = quad.center();
    put_centered(frame, heading, center + Vector::new(0.0, -14.0 * text_scale), 18.0 * text_scale, bold(), with_alpha(Color::WHITE, alpha));
    put_centered(
        frame,
        body,
        center + Vector::new(0.0, 14.0 * text_scale),
        13.0 * text_scale,
        Font::DEFAULT,
        with_alpha(Color::from_rgb8(0xa1, 0xa1, 0xaa), alpha),
    );
}

fn draw_empty_message(frame: &mut Frame, center: Point, alpha: f32) {
    put_centered(frame, "No concepts yet", center + Vector::new(0.0, -14.0), 20.0, bold(), with_alpha(Color::WHITE, alpha));
    put_centered(
        frame,
        "Type a concept above to draw your first card",
        center + Vector::new(0.0, 16.0),
        14.0,
        Font::DEFAULT,
        with_alpha(Color::from_rgb8(0xa1, 0xa1, 0xaa), alpha),
    );
}

fn draw_debris(frame: &mut Frame, debris: &Debris<'_>) {
    let origin = Vector::new(debris.overlay.origin.x, debris.overlay.origin.y);
    for particle in debris.particles {
        let [r, g, b, a] = particle.tint.0;
        let color = Color::from_rgba8(r, g, b, a as f32 / 255.0 * particle.alpha());
        let center = particle.center();
        let size = Size::new(particle.size.x, particle.size.y);

        frame.with_save(|frame| {
            frame.translate(origin + Vector::new(center.x, center.y));
            frame.rotate(particle.rotation);
            frame.fill_rectangle(Point::new(-size.width / 2.0, -size.height / 2.0), size, color);
        });
    }
}

fn bold() -> Font {
    Font {
        weight: Weight::Bold,
        ..Font::DEFAULT
    }
}

fn put_text(frame: &mut Frame, content: String, position: Point, size: f32, font: Font, color: Color) {
    frame.fill_text(canvas::Text {
        content,
        position,
        color,
        size: Pixels(size),
        font,
        ..canvas::Text::default()
    });
}

fn put_centered(frame: &mut Frame, content: &str, position: Point, size: f32, font: Font, color: Color) {
    frame.fill_text(canvas::Text {
        content: content.to_string(),
        position,
        color,
        size: Pixels(size),
        font,
        horizontal_alignment: alignment::Horizontal::Center,
        vertical_alignment: alignment::Vertical::Center,
        ..canvas::Text::default()
    });
}

/// Greedy word wrap; the last kept line gets an ellipsis if text was cut
fn wrap(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in text.lines() {
        for word in paragraph.split_whitespace() {
            let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push('…');
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::deck::{card_transform, TransformInput};
    use crate::state::data::Artifact;

    const VIEWPORT: Size = Size::new(1280.0, 800.0);

    fn pose(offset: i32) -> CardTransform {
        card_transform(&TransformInput::resting(offset, VIEWPORT.width), &LayoutConfig::default())
    }

    fn card(index: isize, offset: i32) -> StageCard<'static> {
        StageCard {
            index,
            role: if offset == 0 { SlotRole::Focused } else { SlotRole::Neighbor },
            transform: pose(offset),
            content: CardContent::NewestBoundary,
        }
    }

    fn stage(interactive: bool) -> Stage<'static> {
        Stage {
            cards: vec![card(-1, -1), card(0, 0), card(1, 1)],
            card_size: Size::new(340.0, 340.0 * 14.0 / 9.0),
            surface_visible: true,
            debris: None,
            empty_underlay: false,
            elasticity: Elasticity::for_index(0, 3),
            interactive,
            export: None,
        }
    }

    fn bounds() -> Rectangle {
        Rectangle::new(Point::ORIGIN, VIEWPORT)
    }

    fn press_release(stage: &Stage<'_>, at: Point) -> Option<Message> {
        let mut state = DragState::default();
        let cursor = Cursor::Available(at);
        stage.update(
            &mut state,
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)),
            bounds(),
            cursor,
        );
        stage
            .update(
                &mut state,
                canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)),
                bounds(),
                cursor,
            )
            .1
    }

    #[test]
    fn test_card_rect_of_focused_card() {
        let card = Size::new(340.0, 340.0 * 14.0 / 9.0);
        let rect = card_rect(VIEWPORT, card, &pose(0)).unwrap();
        assert!((rect.width - 340.0).abs() < 1e-3);
        assert!((rect.x - (640.0 - 170.0)).abs() < 1e-3);
        // Lifted 20 px above centre
        assert!((rect.y + rect.height / 2.0 - 380.0).abs() < 1e-3);
    }

    #[test]
    fn test_tap_on_neighbor_selects_it() {
        let stage = stage(true);
        // Newer cards sit to the right
        let right = Point::new(940.0, 380.0);
        assert!(matches!(press_release(&stage, right), Some(Message::CardSelected(-1))));

        let centre = Point::new(640.0, 380.0);
        assert!(matches!(press_release(&stage, centre), Some(Message::CardSelected(0))));
    }

    #[test]
    fn test_taps_ignored_while_locked() {
        let stage = stage(false);
        assert!(press_release(&stage, Point::new(640.0, 380.0)).is_none());
    }

    #[test]
    fn test_drag_on_focused_card_reports_raw_offset() {
        let stage = stage(true);
        let mut state = DragState::default();
        let start = Point::new(640.0, 380.0);
        stage.update(
            &mut state,
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)),
            bounds(),
            Cursor::Available(start),
        );
        let end = Point::new(760.0, 380.0);
        stage.update(
            &mut state,
            canvas::Event::Mouse(mouse::Event::CursorMoved { position: end }),
            bounds(),
            Cursor::Available(end),
        );
        assert!(state.is_dragging);
        assert!(state.displacement > 0.0 && state.displacement < 120.0);

        let (_, message) = stage.update(
            &mut state,
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)),
            bounds(),
            Cursor::Available(end),
        );
        match message {
            Some(Message::DragReleased { offset, .. }) => assert_eq!(offset, 120.0),
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(state.displacement, 0.0);
    }

    #[test]
    fn test_horizontal_wheel_is_forwarded() {
        let stage = stage(true);
        let mut state = DragState::default();
        let (_, message) = stage.update(
            &mut state,
            canvas::Event::Mouse(mouse::Event::WheelScrolled {
                delta: mouse::ScrollDelta::Pixels { x: -30.0, y: 0.0 },
            }),
            bounds(),
            Cursor::Available(Point::new(10.0, 10.0)),
        );
        assert!(matches!(message, Some(Message::Wheel(dx)) if dx == 30.0));
    }

    #[test]
    fn test_hidden_deleting_card_is_not_drawn() {
        let mut stage = stage(false);
        stage.cards[1].role = SlotRole::Deleting;
        stage.surface_visible = false;
        let drawn = stage.layout(VIEWPORT, 0.0);
        assert!(drawn.iter().all(|(card, _)| card.index != 0));
    }

    fn record(words: usize) -> CardRecord {
        CardRecord::new(Artifact {
            title: "Entropy".to_string(),
            subtitle: "PHYSICS".to_string(),
            description: vec!["disorder"; words].join(" "),
            image_url: None,
        })
    }

    #[test]
    fn test_export_of_short_card_keeps_card_size() {
        let card = Size::new(340.0, 340.0 * 14.0 / 9.0);
        let layout = ExportLayout::new(VIEWPORT, card, &record(10));
        assert_eq!(layout.size, card);
        assert_eq!(layout.fit, 1.0);
        assert_eq!(layout.output_size(), (680, (card.height * 2.0).round() as u32));
        assert!((layout.rect.x + layout.rect.width / 2.0 - 640.0).abs() < 1e-3);
    }

    #[test]
    fn test_export_grows_to_show_whole_description() {
        let card = Size::new(340.0, 340.0 * 14.0 / 9.0);
        let record = record(200);
        let lines = description(&record, card.width, usize::MAX).len();
        assert!(lines > DESCRIPTION_MAX_LINES);

        let layout = ExportLayout::new(VIEWPORT, card, &record);
        assert!(layout.size.height > card.height);
        assert_eq!(layout.size.width, card.width);
        // Shrunk on screen but saved at full size
        assert!(layout.fit < 1.0);
        assert!(layout.rect.height <= VIEWPORT.height - 2.0 * EXPORT_MARGIN + 1e-3);
        assert!(layout.rect.y >= EXPORT_MARGIN - 1e-3);
        assert_eq!(layout.output_size().1, (layout.size.height * EXPORT_SCALE).round() as u32);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three four", 9, 5), ["one two", "three", "four"]);
        assert_eq!(wrap("one two three four", 9, 2), ["one two", "three…"]);
        assert_eq!(wrap("first\n\nsecond", 20, 5), ["first", "second"]);
        assert!(wrap("", 10, 3).is_empty());
    }

    #[test]
    fn test_hsl_primaries() {
        assert_eq!(hsl(0.0, 1.0, 0.5), Color::from_rgb(1.0, 0.0, 0.0));
        assert_eq!(hsl(240.0, 1.0, 0.5), Color::from_rgb(0.0, 0.0, 1.0));
    }
}
