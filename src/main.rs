mod style;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iced::button::{self, Button};
use iced::canvas::{self, Canvas, Cursor, Frame, Geometry};
use iced::scrollable::{self, Scrollable};
use iced::slider::{self, Slider};
use iced::{
    image, time, Align, Application, Clipboard, Color, Column, Command, Container, Element,
    HorizontalAlignment, Image, Length, Point, Rectangle, Row, Settings, Subscription, Text,
    VerticalAlignment,
};
use iced_native::{event, keyboard, mouse, window, Event};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sacks::app::{self, Controller, Effects, Shortcut, SIDEBAR_WIDTH};
use sacks::compositor::FrameStats;
use sacks::error::Diagnostic;
use sacks::parameters::{self as ranges, Field, Parameters, Recompute, Zoom};
use sacks::schedule::{idle_slot, settle, GenerationToken, Ticket, DEBOUNCE};
use sacks::spiral::MAX_POINTS;
use sacks::store::{JsonFileStore, KeyValueStore, NullStore};

/// Fixed frame cadence; cluster motion and rotation advance once per frame.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const NOTICE_LIFETIME: Duration = Duration::from_secs(3);
const WINDOW_SIZE: (u32, u32) = (1280, 800);
const HUD_HEIGHT: u16 = 120;

const PARAMETERS_ENV: &str = "SACKS_PARAMETERS";
const DEFAULT_PARAMETERS_PATH: &str = "parameters.json";

#[derive(Clone, Debug)]
enum Message {
    Loaded(Parameters),
    Frame,
    TogglePlay,
    Idle(GenerationToken),
    Settled(Recompute, Ticket),
    Resized { width: u32, height: u32 },
    Zoom(Zoom),
    Toggle(Field),
    AnimateSpiral,
    ScaleChanged(f32),
    MaxNChanged(i32),
    SpiralCoeffChanged(f32),
    RotationSpeedChanged(f32),
    DotSizeChanged(f32),
    PrimeSizeChanged(f32),
    ClusterCountChanged(i32),
    AnimationSpeedChanged(i32),
    AnimationIncrementChanged(f32),
    AnimationMinChanged(f32),
    AnimationMaxChanged(f32),
    Persisted(Result<(), String>),
}

#[derive(Default)]
struct Controls {
    scroll: scrollable::State,
    play_button: button::State,
    primes_button: button::State,
    clusters_button: button::State,
    rotation_button: button::State,
    squares_button: button::State,
    instant_button: button::State,
    animate_button: button::State,
    scale_slider: slider::State,
    max_n_slider: slider::State,
    coeff_slider: slider::State,
    rotation_slider: slider::State,
    dot_slider: slider::State,
    prime_slider: slider::State,
    cluster_slider: slider::State,
    animation_speed_slider: slider::State,
    animation_increment_slider: slider::State,
    animation_min_slider: slider::State,
    animation_max_slider: slider::State,
}

struct Notice {
    text: String,
    shown_at: Instant,
}

struct Flags {
    store: Arc<dyn KeyValueStore>,
}

struct Sacks {
    controller: Controller,
    store: Arc<dyn KeyValueStore>,
    notice: Option<Notice>,
    controls: Controls,
}

impl Sacks {
    fn notify(&mut self, diagnostic: Diagnostic) {
        self.notice = Some(Notice {
            text: diagnostic.to_string(),
            shown_at: Instant::now(),
        });
    }

    /// Turns the controller's leftover work into commands.
    fn schedule(&mut self, effects: Effects) -> Command<Message> {
        let Effects {
            persist,
            generation,
            debounce,
            diagnostics,
        } = effects;

        for diagnostic in diagnostics {
            self.notify(diagnostic);
        }

        let mut commands: Vec<Command<Message>> =
            persist.into_iter().map(|field| self.persist(field)).collect();
        if let Some(token) = generation {
            commands.push(Command::perform(idle_slot(token), Message::Idle));
        }
        if let Some((kind, ticket)) = debounce {
            commands.push(Command::perform(settle(DEBOUNCE, ticket), move |ticket| {
                Message::Settled(kind, ticket)
            }));
        }

        Command::batch(commands)
    }

    fn persist(&self, field: Field) -> Command<Message> {
        let value = self.controller.parameters().value(field);
        Command::perform(self.store.put(field.key(), value), |result| {
            Message::Persisted(result.map_err(|error| error.to_string()))
        })
    }

    fn render(&mut self) {
        if let Err(error) = self.controller.render() {
            debug!(%error, "skipped frame");
        }

        let expired = self
            .notice
            .as_ref()
            .map_or(false, |notice| notice.shown_at.elapsed() > NOTICE_LIFETIME);
        if expired {
            self.notice = None;
        }
    }
}

impl Application for Sacks {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Flags = Flags;

    fn new(flags: Self::Flags) -> (Self, Command<Message>) {
        let viewport = app::stage_viewport(WINDOW_SIZE.0, WINDOW_SIZE.1);
        let store = flags.store;

        (
            Self {
                controller: Controller::new(viewport),
                store: store.clone(),
                notice: None,
                controls: Controls::default(),
            },
            Command::perform(Parameters::load(store), Message::Loaded),
        )
    }

    fn title(&self) -> String {
        String::from("Sacks Spiral")
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![iced_native::subscription::events_with(handle_event)];

        if self.controller.is_playing() {
            subscriptions.push(time::every(FRAME_INTERVAL).map(|_| Message::Frame));
        }
        let parameters = self.controller.parameters();
        if parameters.animate_spiral_coeff() {
            subscriptions.push(
                time::every(parameters.spiral_animation_interval())
                    .map(|_| Message::AnimateSpiral),
            );
        }

        Subscription::batch(subscriptions)
    }

    fn update(&mut self, message: Self::Message, _clipboard: &mut Clipboard) -> Command<Message> {
        let effects = match message {
            Message::Loaded(parameters) => self.controller.load(parameters),
            Message::Frame => {
                self.render();
                return Command::none();
            }
            Message::TogglePlay => {
                self.controller.toggle_play();
                return Command::none();
            }
            Message::Idle(token) => {
                return match self.controller.run_chunk(token) {
                    Some(token) => Command::perform(idle_slot(token), Message::Idle),
                    None => Command::none(),
                };
            }
            Message::Settled(kind, ticket) => self.controller.settle(kind, ticket),
            Message::Resized { width, height } => {
                self.controller.resize(app::stage_viewport(width, height))
            }
            Message::Zoom(zoom) => self.controller.zoom(zoom),
            Message::Toggle(field) => self.controller.toggle(field),
            Message::AnimateSpiral => self.controller.animate(),
            Message::ScaleChanged(value) => self
                .controller
                .change(|parameters| parameters.set_scale(value as f64)),
            Message::MaxNChanged(value) => self
                .controller
                .change(|parameters| parameters.set_max_n(value as i64)),
            Message::SpiralCoeffChanged(value) => self
                .controller
                .change(|parameters| parameters.set_spiral_coeff(value as f64)),
            Message::RotationSpeedChanged(value) => self
                .controller
                .change(|parameters| parameters.set_rotation_speed(value as f64)),
            Message::DotSizeChanged(value) => self
                .controller
                .change(|parameters| parameters.set_dot_size(value as f64)),
            Message::PrimeSizeChanged(value) => self
                .controller
                .change(|parameters| parameters.set_prime_size(value as f64)),
            Message::ClusterCountChanged(value) => self
                .controller
                .change(|parameters| parameters.set_cluster_count(value as i64)),
            Message::AnimationSpeedChanged(value) => self
                .controller
                .change(|parameters| parameters.set_spiral_animation_speed(value as i64)),
            Message::AnimationIncrementChanged(value) => self
                .controller
                .change(|parameters| parameters.set_spiral_animation_increment(value as f64)),
            Message::AnimationMinChanged(value) => self
                .controller
                .change(|parameters| parameters.set_spiral_animation_min(value as f64)),
            Message::AnimationMaxChanged(value) => self
                .controller
                .change(|parameters| parameters.set_spiral_animation_max(value as f64)),
            Message::Persisted(result) => {
                if let Err(error) = result {
                    warn!(%error, "failed to persist parameter");
                }
                return Command::none();
            }
        };
        self.schedule(effects)
    }

    fn view(&mut self) -> Element<Message> {
        let controller = &self.controller;
        let parameters = controller.parameters();
        let raster = controller.raster();
        let is_playing = controller.is_playing();
        let controls = &mut self.controls;

        let spiral = Container::new(
            Image::new(image::Handle::from_pixels(
                raster.width(),
                raster.height(),
                raster.bgra().to_vec(),
            ))
            .width(Length::Fill)
            .height(Length::Fill),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .style(style::Stage);

        let play = Button::new(
            &mut controls.play_button,
            Text::new(if is_playing { "Pause" } else { "Play" }),
        )
        .on_press(Message::TogglePlay)
        .width(Length::Fill)
        .style(style::Toggle { active: is_playing });

        let toggles = Column::new()
            .spacing(6)
            .push(play)
            .push(toggle(
                &mut controls.primes_button,
                "Primes (p)",
                Field::ShowPrimes,
                parameters.show_primes(),
            ))
            .push(toggle(
                &mut controls.clusters_button,
                "Clusters (a)",
                Field::ShowClusters,
                parameters.show_clusters(),
            ))
            .push(toggle(
                &mut controls.rotation_button,
                "Rotation (r)",
                Field::ShowRotation,
                parameters.show_rotation(),
            ))
            .push(toggle(
                &mut controls.squares_button,
                "Squares (c)",
                Field::UseSquares,
                parameters.use_squares(),
            ))
            .push(toggle(
                &mut controls.instant_button,
                "Instant render (i)",
                Field::InstantRender,
                parameters.instant_render(),
            ))
            .push(toggle(
                &mut controls.animate_button,
                "Animate coefficient (m)",
                Field::AnimateSpiralCoeff,
                parameters.animate_spiral_coeff(),
            ));

        let sliders = Column::new()
            .spacing(8)
            .push(float_slider(
                &mut controls.scale_slider,
                format!("Scale = {:.2}", parameters.scale()),
                ranges::SCALE_RANGE,
                parameters.scale(),
                0.1,
                Message::ScaleChanged,
            ))
            .push(int_slider(
                &mut controls.max_n_slider,
                format!("Max n = {}", parameters.max_n()),
                (1, MAX_POINTS as i32),
                parameters.max_n() as i32,
                1000,
                Message::MaxNChanged,
            ))
            .push(float_slider(
                &mut controls.coeff_slider,
                format!("Spiral coefficient = {:.2}", parameters.spiral_coeff()),
                ranges::SPIRAL_COEFF_RANGE,
                parameters.spiral_coeff(),
                0.01,
                Message::SpiralCoeffChanged,
            ))
            .push(float_slider(
                &mut controls.rotation_slider,
                format!("Rotation speed = {:.1}", parameters.rotation_speed()),
                ranges::ROTATION_SPEED_RANGE,
                parameters.rotation_speed(),
                0.1,
                Message::RotationSpeedChanged,
            ))
            .push(float_slider(
                &mut controls.dot_slider,
                format!("Dot size = {:.1}", parameters.dot_size()),
                ranges::DOT_SIZE_RANGE,
                parameters.dot_size(),
                0.1,
                Message::DotSizeChanged,
            ))
            .push(float_slider(
                &mut controls.prime_slider,
                format!("Prime size = {:.1}", parameters.prime_size()),
                ranges::PRIME_SIZE_RANGE,
                parameters.prime_size(),
                0.1,
                Message::PrimeSizeChanged,
            ))
            .push(int_slider(
                &mut controls.cluster_slider,
                format!("Clusters = {}", parameters.cluster_count()),
                (0, 2000),
                parameters.cluster_count() as i32,
                1,
                Message::ClusterCountChanged,
            ))
            .push(int_slider(
                &mut controls.animation_speed_slider,
                format!(
                    "Animation interval = {} ms",
                    parameters.spiral_animation_interval().as_millis()
                ),
                (
                    ranges::ANIMATION_SPEED_RANGE.0 as i32,
                    ranges::ANIMATION_SPEED_RANGE.1 as i32,
                ),
                parameters.spiral_animation_interval().as_millis() as i32,
                10,
                Message::AnimationSpeedChanged,
            ))
            .push(float_slider(
                &mut controls.animation_increment_slider,
                format!(
                    "Animation increment = {:.2}",
                    parameters.spiral_animation_increment()
                ),
                ranges::ANIMATION_INCREMENT_RANGE,
                parameters.spiral_animation_increment(),
                0.01,
                Message::AnimationIncrementChanged,
            ))
            .push(float_slider(
                &mut controls.animation_min_slider,
                format!("Animation min = {:.1}", parameters.spiral_animation_min()),
                ranges::ANIMATION_MIN_RANGE,
                parameters.spiral_animation_min(),
                0.1,
                Message::AnimationMinChanged,
            ))
            .push(float_slider(
                &mut controls.animation_max_slider,
                format!("Animation max = {:.1}", parameters.spiral_animation_max()),
                ranges::ANIMATION_MAX_RANGE,
                parameters.spiral_animation_max(),
                0.1,
                Message::AnimationMaxChanged,
            ));

        let hud = Canvas::new(Hud {
            points: controller.generator().points().len(),
            is_generating: controller.generator().is_generating(),
            clusters: controller.simulator().clusters().len(),
            frame: controller.last_frame(),
            frame_duration: controller.last_frame_duration(),
            is_playing,
            notice: self.notice.as_ref().map(|notice| notice.text.clone()),
        })
        .width(Length::Fill)
        .height(Length::Units(HUD_HEIGHT));

        let sidebar = Scrollable::new(&mut controls.scroll)
            .spacing(16)
            .padding(10)
            .align_items(Align::Start)
            .push(hud)
            .push(toggles)
            .push(sliders);

        let sidebar = Container::new(sidebar)
            .width(Length::Units(SIDEBAR_WIDTH as u16))
            .height(Length::Fill)
            .style(style::Sidebar);

        Row::new().push(spiral).push(sidebar).into()
    }
}

fn toggle<'a>(
    state: &'a mut button::State,
    label: &str,
    field: Field,
    active: bool,
) -> Element<'a, Message> {
    Button::new(state, Text::new(label).size(16))
        .on_press(Message::Toggle(field))
        .width(Length::Fill)
        .style(style::Toggle { active })
        .into()
}

fn float_slider<'a>(
    state: &'a mut slider::State,
    label: String,
    (min, max): (f64, f64),
    value: f64,
    step: f32,
    on_change: fn(f32) -> Message,
) -> Element<'a, Message> {
    let (min, max) = (min as f32, max as f32);
    Column::new()
        .spacing(4)
        .push(Text::new(label).size(16))
        .push(
            Slider::new(state, min..=max, (value as f32).max(min).min(max), on_change)
                .step(step)
                .style(style::Slider),
        )
        .into()
}

fn int_slider<'a>(
    state: &'a mut slider::State,
    label: String,
    (min, max): (i32, i32),
    value: i32,
    step: i32,
    on_change: fn(i32) -> Message,
) -> Element<'a, Message> {
    Column::new()
        .spacing(4)
        .push(Text::new(label).size(16))
        .push(
            Slider::new(state, min..=max, value.max(min).min(max), on_change)
                .step(step)
                .style(style::Slider),
        )
        .into()
}

/// Stats overlay drawn above the controls.
struct Hud {
    points: usize,
    is_generating: bool,
    clusters: usize,
    frame: FrameStats,
    frame_duration: Duration,
    is_playing: bool,
    notice: Option<String>,
}

impl canvas::Program<Message> for Hud {
    fn draw(&self, bounds: Rectangle, _cursor: Cursor) -> Vec<Geometry> {
        let mut frame = Frame::new(bounds.size());

        let text = canvas::Text {
            color: Color::WHITE,
            size: 14.0,
            position: Point::ORIGIN,
            horizontal_alignment: HorizontalAlignment::Left,
            vertical_alignment: VerticalAlignment::Top,
            ..Default::default()
        };

        frame.fill_text(canvas::Text {
            content: format! {
                "Points: {}{}\nDrawn: {} ({} primes)\n\
                 Clusters: {}\nRotation: {:.2} rad\nFrame: {:?}{}",
                self.points,
                if self.is_generating { " (generating)" } else { "" },
                self.frame.drawn,
                self.frame.primes,
                self.clusters,
                self.frame.rotation,
                self.frame_duration,
                if self.is_playing { "" } else { " (paused)" },
            },
            ..text
        });

        if let Some(notice) = &self.notice {
            frame.fill_text(canvas::Text {
                content: notice.clone(),
                color: Color::from_rgb(1.0, 0.8, 0.2),
                position: Point::new(0.0, frame.height()),
                vertical_alignment: VerticalAlignment::Bottom,
                size: 13.0,
                ..text
            });
        }

        vec![frame.into_geometry()]
    }
}

fn handle_event(event: Event, status: event::Status) -> Option<Message> {
    let ignored = matches!(status, event::Status::Ignored);

    match event {
        Event::Window(window::Event::Resized { width, height }) => {
            Some(Message::Resized { width, height })
        }
        Event::Mouse(mouse::Event::WheelScrolled { delta }) if ignored => {
            let y = match delta {
                mouse::ScrollDelta::Lines { y, .. } | mouse::ScrollDelta::Pixels { y, .. } => y,
            };
            app::wheel_zoom(y).map(Message::Zoom)
        }
        Event::Keyboard(keyboard::Event::CharacterReceived(c)) if ignored => {
            app::shortcut(c).map(|shortcut| match shortcut {
                Shortcut::Toggle(field) => Message::Toggle(field),
                Shortcut::TogglePlay => Message::TogglePlay,
            })
        }
        _ => None,
    }
}

fn open_store() -> Arc<dyn KeyValueStore> {
    match std::env::var_os(PARAMETERS_ENV) {
        Some(path) if path.is_empty() => {
            info!("parameter persistence disabled");
            Arc::new(NullStore)
        }
        path => {
            let path = path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PARAMETERS_PATH));
            info!(path = %path.display(), "using parameter store");
            Arc::new(JsonFileStore::new(path))
        }
    }
}

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sacks=info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Sacks::run(Settings {
        window: iced::window::Settings {
            size: WINDOW_SIZE,
            ..Default::default()
        },
        antialiasing: true,
        ..Settings::with_flags(Flags {
            store: open_store(),
        })
    })
}
