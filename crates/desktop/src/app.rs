//! deckchat Desktop — egui app state and UI.

use eframe::egui;
use lib::attachment::{self, AttachedFile};
use lib::client::RelayClient;
use lib::conversation::{ChatController, Message, WireMessage, MAX_DRAFT_CHARS};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const CHAT_INPUT_HEIGHT: f32 = 110.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;
const PROBE_INTERVAL_FRAMES: u32 = 30;

/// Suggestion cards shown before the first exchange.
const SUGGESTIONS: [&str; 3] = [
    "Plan a training deck",
    "Create a sales pitch deck",
    "Summarize a project update",
];

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!("{} [{}] {}", chrono_lite(), record.level(), record.args());
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

fn chrono_lite() -> String {
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = t.as_secs();
    let millis = t.subsec_millis();
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

#[derive(Default, PartialEq, Eq, Clone, Copy)]
enum Screen {
    #[default]
    Chat,
    Logs,
}

/// Result of reading files picked for staging: the files plus any per-file
/// failure messages (failures never block the successfully read files).
type StagedFiles = (Vec<AttachedFile>, Vec<String>);

pub struct DeckchatApp {
    /// Relay bind address and port from config, fixed at startup.
    relay_bind: String,
    relay_port: u16,
    /// True if the relay address accepted a TCP connection.
    relay_responds: bool,
    /// True once we have received at least one probe result.
    probe_completed: bool,
    /// When Some, a probe is in flight; we read the result here.
    probe_receiver: Option<mpsc::Receiver<bool>>,
    /// Frames since we last started a probe.
    frames_since_probe: u32,
    /// All client-side conversation state (transcript, draft, staged files, phase).
    controller: ChatController,
    /// Editable mirror of the controller's draft (egui needs a &mut String).
    draft_buffer: String,
    /// Path field for staging an attachment by hand.
    attach_path: String,
    /// Read failures from the last staging attempt, shown above the input.
    attach_errors: Vec<String>,
    /// When Some, a relay call is in flight; we read the result here.
    chat_turn_receiver: Option<mpsc::Receiver<Result<String, String>>>,
    /// When Some, file reads are in flight; we read staged files here.
    stage_receiver: Option<mpsc::Receiver<StagedFiles>>,
    /// Current screen (Chat, Logs).
    current_screen: Screen,
}

impl DeckchatApp {
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 24.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let (config, _) = lib::config::load_config(None)
            .unwrap_or((lib::config::Config::default(), PathBuf::new()));
        Self {
            relay_bind: config.server.bind.trim().to_string(),
            relay_port: lib::config::resolve_port(&config),
            relay_responds: false,
            probe_completed: false,
            probe_receiver: None,
            frames_since_probe: PROBE_INTERVAL_FRAMES,
            controller: ChatController::new(),
            draft_buffer: String::new(),
            attach_path: String::new(),
            attach_errors: Vec::new(),
            chat_turn_receiver: None,
            stage_receiver: None,
            current_screen: Screen::default(),
        }
    }

    fn relay_url(&self) -> String {
        format!("http://{}:{}", self.relay_bind, self.relay_port)
    }

    fn poll_relay_probe(&mut self) {
        if let Some(rx) = &self.probe_receiver {
            if let Ok(ok) = rx.try_recv() {
                self.probe_completed = true;
                self.relay_responds = ok;
                self.probe_receiver = None;
            }
        }
        self.frames_since_probe = self.frames_since_probe.saturating_add(1);
        if self.probe_receiver.is_none() && self.frames_since_probe >= PROBE_INTERVAL_FRAMES {
            self.frames_since_probe = 0;
            let addr_str = format!("{}:{}", self.relay_bind, self.relay_port);
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let ok = addr_str
                    .parse::<SocketAddr>()
                    .ok()
                    .and_then(|addr| {
                        std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(800))
                            .ok()
                    })
                    .is_some();
                let _ = tx.send(ok);
            });
            self.probe_receiver = Some(rx);
        }
    }

    /// Start a relay call in a background thread if the controller allows it.
    fn start_chat_turn(&mut self) {
        if self.chat_turn_receiver.is_some() {
            return;
        }
        let Some(wire) = self.controller.begin_submit() else {
            return;
        };
        self.draft_buffer.clear();
        self.attach_errors.clear();

        let url = self.relay_url();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(run_relay_turn(&url, wire));
        });
        self.chat_turn_receiver = Some(rx);
    }

    fn poll_chat_turn(&mut self) {
        if let Some(rx) = &self.chat_turn_receiver {
            if let Ok(result) = rx.try_recv() {
                self.chat_turn_receiver = None;
                self.controller.complete_submit(result);
            }
        }
    }

    /// Read the given files on a background thread and stage the successes.
    fn stage_from_paths(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() || self.stage_receiver.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(read_files_blocking(paths));
        });
        self.stage_receiver = Some(rx);
    }

    fn poll_staging(&mut self) {
        if let Some(rx) = &self.stage_receiver {
            if let Ok((files, errors)) = rx.try_recv() {
                self.stage_receiver = None;
                self.controller.stage_files(files);
                self.attach_errors = errors;
            }
        }
    }

    fn start_new(&mut self) {
        self.controller.start_new();
        self.chat_turn_receiver = None;
        self.draft_buffer.clear();
        self.attach_path.clear();
        self.attach_errors.clear();
    }

    fn render_chat_message(ui: &mut egui::Ui, m: &Message) {
        let is_user = m.role == "user";
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            if is_user {
                ui.label(egui::RichText::new(&m.content).strong());
            } else {
                ui.label(&m.content);
            }
            if !m.attachments.is_empty() {
                ui.add_space(4.0);
                ui.horizontal_wrapped(|ui| {
                    for a in &m.attachments {
                        ui.label(
                            egui::RichText::new(format!("📎 {} ({})", a.name, a.media_type))
                                .small(),
                        );
                    }
                });
            }
        });
    }

    fn ui_intro(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.label("✦ What would you like to create today?");
        ui.add_space(4.0);
        ui.heading("Tell me what you need");
        ui.add_space(16.0);
        ui.horizontal_wrapped(|ui| {
            for s in SUGGESTIONS {
                if ui.button(s).clicked() {
                    self.controller.select_suggestion(s);
                    self.draft_buffer = self.controller.draft().to_string();
                }
            }
        });
    }

    /// Render the chat UI (messages + input). The messages area fills the
    /// space with stick-to-bottom; input and controls are fixed below it.
    fn ui_chat(&mut self, ui: &mut egui::Ui, relay_running: bool) {
        let has_conversation = !self.controller.transcript().is_empty();

        if has_conversation {
            ui.horizontal(|ui| {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✦ Start new").clicked() {
                        self.start_new();
                    }
                });
            });
        } else {
            self.ui_intro(ui);
        }

        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height =
            CHAT_INPUT_HEIGHT + 8.0 + 2.0 * row_height + Self::SCREEN_FOOTER_SPACING;
        let available = ui.available_height();
        let messages_height = (available - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);

        let messages_rect = ui
            .allocate_exact_size(
                egui::vec2(ui.available_width(), messages_height),
                egui::Sense::hover(),
            )
            .0;
        let mut messages_ui =
            ui.child_ui(messages_rect, egui::Layout::top_down(egui::Align::Min));
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .show(&mut messages_ui, |ui| {
                let content_width = ui.available_width();
                ui.allocate_exact_size(egui::vec2(content_width, 0.0), egui::Sense::hover());
                for m in self.controller.transcript() {
                    Self::render_chat_message(ui, m);
                    ui.add_space(8.0);
                }
                if self.controller.is_submitting() {
                    ui.label(egui::RichText::new("Thinking…").weak());
                }
            });

        ui.add_space(8.0);

        // Staged attachments with remove buttons; read failures below them.
        let mut remove_index: Option<usize> = None;
        for (i, file) in self.controller.staged().iter().enumerate() {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!(
                        "📎 {} ({}, {})",
                        file.name,
                        file.media_type,
                        attachment::format_size(file.size)
                    ))
                    .small(),
                );
                if ui.small_button("×").clicked() {
                    remove_index = Some(i);
                }
            });
        }
        if let Some(i) = remove_index {
            self.controller.remove_file(i);
        }
        for err in &self.attach_errors {
            ui.colored_label(egui::Color32::RED, err);
        }

        let can_send = relay_running && self.controller.can_submit();

        let text_response = ui.add_enabled_ui(!self.controller.is_submitting(), |ui| {
            ui.add_sized(
                [ui.available_width(), CHAT_INPUT_HEIGHT],
                egui::TextEdit::multiline(&mut self.draft_buffer)
                    .hint_text("Describe the presentation you need…"),
            )
        });
        let response = text_response.inner;
        if response.changed() {
            self.controller.update_draft(&self.draft_buffer);
            // Re-read so the 4000-char clamp shows in the editor.
            self.draft_buffer = self.controller.draft().to_string();
        }
        ui.add_space(8.0);

        let mut send_now = false;
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!(
                    "{} / {}",
                    self.draft_buffer.chars().count(),
                    MAX_DRAFT_CHARS
                ))
                .weak(),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                    send_now = true;
                }
                ui.add_space(8.0);
                let attach_clicked = ui.button("Attach").clicked();
                ui.add_sized(
                    [ui.available_width().min(280.0), ui.spacing().interact_size.y],
                    egui::TextEdit::singleline(&mut self.attach_path)
                        .hint_text("path to a file…"),
                );
                let path = self.attach_path.trim().to_string();
                if attach_clicked && !path.is_empty() {
                    self.stage_from_paths(vec![PathBuf::from(path)]);
                    self.attach_path.clear();
                }
            });
        });

        if can_send && response.has_focus() {
            let modifiers = ui.input(|i| i.modifiers);
            if (modifiers.command || modifiers.ctrl)
                && ui.input(|i| i.key_pressed(egui::Key::Enter))
            {
                send_now = true;
            }
        }
        if send_now {
            self.start_chat_turn();
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(12.0);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace));
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for DeckchatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_relay_probe();
        self.poll_chat_turn();
        self.poll_staging();

        // Dropped files stage like picked ones.
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !dropped.is_empty() {
            self.stage_from_paths(dropped);
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.heading("deckchat");
                ui.selectable_value(&mut self.current_screen, Screen::Chat, "Chat");
                ui.selectable_value(&mut self.current_screen, Screen::Logs, "Logs");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !self.probe_completed {
                        ui.label(egui::RichText::new("Checking relay…").weak());
                    } else if self.relay_responds {
                        ui.label(egui::RichText::new("Relay running").weak());
                    } else {
                        ui.colored_label(
                            egui::Color32::RED,
                            format!("Relay unreachable at {}", self.relay_url()),
                        );
                    }
                });
            });
            ui.add_space(8.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(16.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => self.ui_chat(ui, self.relay_responds),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });

        // Keep polling the receivers and the probe while idle.
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

/// One relay call on a private runtime; runs in a worker thread.
fn run_relay_turn(url: &str, messages: Vec<WireMessage>) -> Result<String, String> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    rt.block_on(async move {
        RelayClient::new(url)
            .send(messages)
            .await
            .map_err(|e| e.to_string())
    })
}

/// Read files for staging on a private runtime; runs in a worker thread.
fn read_files_blocking(paths: Vec<PathBuf>) -> StagedFiles {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return (Vec::new(), vec![format!("could not read files: {}", e)]),
    };
    let (files, failures) = rt.block_on(attachment::read_files(&paths));
    let errors = failures
        .into_iter()
        .map(|(path, e)| format!("could not attach {}: {}", path.display(), e))
        .collect();
    (files, errors)
}
