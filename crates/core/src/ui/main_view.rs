//! The main window.
//!
//! `MainView` renders controller snapshots and turns clicks and hotkey
//! events into controller calls. It owns the shortcut dispatcher, so the
//! global shortcuts live exactly as long as the view.

use super::rendering::{format_encoded_size, short_id, status_line};
use super::window::ViewportWindow;
use crate::analysis::{AnalysisResult, Backend};
use crate::capture::ScreenCapturer;
use crate::clipboard::SystemClipboard;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::shortcuts::{
    Dispatch, ShortcutAction, ShortcutBindings, ShortcutDispatcher, dispatch, pending_actions,
};
use crate::workflow::{WorkflowController, WorkflowSettings, WorkflowSnapshot, WorkflowState};
use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use global_hotkey::GlobalHotKeyManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// The controller as wired up for the desktop window.
pub type AppController = WorkflowController<ViewportWindow, ScreenCapturer, Backend>;

const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Things the user can do in the window.
enum ViewAction {
    Shortcut(ShortcutAction),
    Delete(String),
    NewAnalysis,
    DismissError,
}

pub struct MainView {
    controller: Arc<AppController>,
    dispatcher: Option<ShortcutDispatcher<GlobalHotKeyManager>>,
    clipboard: SystemClipboard,
    runtime: Handle,
    description: String,
    markdown_cache: CommonMarkCache,
}

impl MainView {
    /// Wires the controller to this window and registers the shortcuts.
    ///
    /// Shortcut registration failures are logged; the buttons keep working.
    pub fn new(
        ctx: &egui::Context,
        config: &Config,
        backend: Backend,
        bindings: ShortcutBindings,
        runtime: Handle,
    ) -> Self {
        let controller = Arc::new(WorkflowController::new(
            ViewportWindow::new(ctx.clone()),
            ScreenCapturer::new(config.monitor_index),
            backend,
            WorkflowSettings::from_config(config),
        ));

        let dispatcher = match GlobalHotKeyManager::new() {
            Ok(manager) => match ShortcutDispatcher::new(manager, bindings) {
                Ok(dispatcher) => Some(dispatcher),
                Err(e) => {
                    log::warn!("{}. Continuing without global shortcuts.", e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Could not create hotkey manager: {}. Continuing without global shortcuts.", e);
                None
            }
        };

        Self {
            controller,
            dispatcher,
            clipboard: SystemClipboard,
            runtime,
            description: String::new(),
            markdown_cache: CommonMarkCache::default(),
        }
    }

    fn apply(&mut self, action: ViewAction) {
        match action {
            ViewAction::Shortcut(action) => {
                let outcome = dispatch(action, &self.controller, &self.clipboard, &self.runtime);
                if matches!(outcome, Dispatch::Ignored) {
                    log::debug!("{:?} ignored in current state", action);
                }
            }
            ViewAction::Delete(id) => {
                self.controller.delete_screenshot(&id);
            }
            ViewAction::NewAnalysis => {
                self.controller.new_analysis();
            }
            ViewAction::DismissError => {
                self.controller.dismiss_error();
            }
        }
    }

    fn hint(&self, action: ShortcutAction) -> String {
        let Some(dispatcher) = &self.dispatcher else {
            return String::new();
        };
        let bindings = dispatcher.bindings();
        let hotkey = match action {
            ShortcutAction::Capture => bindings.capture,
            ShortcutAction::Analyze => bindings.analyze,
            ShortcutAction::CopyResult => bindings.copy_result,
        };
        format!(" ({})", hotkey.into_string())
    }

    /// Screenshot list plus description box.
    fn render_compose_ui(&mut self, ui: &mut egui::Ui, snapshot: &WorkflowSnapshot, actions: &mut Vec<ViewAction>) {
        ui.heading("Screenshots");
        if snapshot.screenshots.is_empty() {
            ui.label(format!(
                "Nothing captured yet. Press Capture{} to grab the screen.",
                self.hint(ShortcutAction::Capture)
            ));
        }

        let idle = snapshot.state == WorkflowState::Idle;
        egui::ScrollArea::vertical()
            .id_salt("screenshots")
            .max_height(160.0)
            .show(ui, |ui| {
                for (index, shot) in snapshot.screenshots.iter().enumerate() {
                    ui.horizontal(|ui| {
                        ui.label(format!(
                            "#{} {} · {}",
                            index + 1,
                            short_id(&shot.id),
                            format_encoded_size(shot.encoded_len)
                        ))
                        .on_hover_text(shot.storage_path.display().to_string());
                        if ui.add_enabled(idle, egui::Button::new("🗑")).clicked() {
                            actions.push(ViewAction::Delete(shot.id.clone()));
                        }
                    });
                }
            });

        ui.separator();
        ui.label("Additional description (optional):");
        let response = ui.add(
            egui::TextEdit::multiline(&mut self.description)
                .desired_rows(3)
                .desired_width(f32::INFINITY)
                .hint_text("e.g. Solve this in Python"),
        );
        if response.changed()
            && !self
                .controller
                .edit_description(&snapshot.description, self.description.clone())
        {
            self.description.clone_from(&snapshot.description);
        }

        ui.horizontal(|ui| {
            let capture = format!("📷 Capture{}", self.hint(ShortcutAction::Capture));
            if ui.add_enabled(!snapshot.state.is_busy(), egui::Button::new(capture)).clicked() {
                actions.push(ViewAction::Shortcut(ShortcutAction::Capture));
            }
            let analyze = format!("➤ Analyze{}", self.hint(ShortcutAction::Analyze));
            let can_analyze = idle && !snapshot.screenshots.is_empty();
            if ui.add_enabled(can_analyze, egui::Button::new(analyze)).clicked() {
                actions.push(ViewAction::Shortcut(ShortcutAction::Analyze));
            }
        });
    }

    fn render_result_ui(&mut self, ui: &mut egui::Ui, result: &AnalysisResult, actions: &mut Vec<ViewAction>) {
        egui::ScrollArea::vertical()
            .id_salt("result")
            .max_height((ui.available_height() - 60.0).max(120.0))
            .show(ui, |ui| {
                if let Some(explanation) = &result.explanation {
                    ui.heading("Explanation");
                    CommonMarkViewer::new().show(ui, &mut self.markdown_cache, explanation);
                }
                if let Some(solution) = result.clean_solution() {
                    ui.add_space(8.0);
                    ui.heading("Solution");
                    ui.add(
                        egui::TextEdit::multiline(&mut solution.as_str())
                            .code_editor()
                            .desired_width(f32::INFINITY),
                    );
                }
                if let Some(detailed) = &result.explanation_detailed {
                    ui.add_space(8.0);
                    ui.collapsing("Detailed explanation", |ui| {
                        CommonMarkViewer::new().show(ui, &mut self.markdown_cache, detailed);
                    });
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            if result.clean_solution().is_some() {
                let copy = format!("Copy solution{}", self.hint(ShortcutAction::CopyResult));
                if ui.button(copy).clicked() {
                    actions.push(ViewAction::Shortcut(ShortcutAction::CopyResult));
                }
            }
            if ui.button("New analysis").clicked() {
                actions.push(ViewAction::NewAnalysis);
            }
        });
    }

    fn render_error_ui(&self, ui: &mut egui::Ui, message: &str, actions: &mut Vec<ViewAction>) {
        ui.label(egui::RichText::new(format!("Error: {}", message)).color(egui::Color32::RED));
        if ui.button("Back").clicked() {
            actions.push(ViewAction::DismissError);
        }
    }
}

impl eframe::App for MainView {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        let mut actions: Vec<ViewAction> = match &self.dispatcher {
            Some(dispatcher) => pending_actions(dispatcher)
                .into_iter()
                .map(ViewAction::Shortcut)
                .collect(),
            None => Vec::new(),
        };

        self.controller.ensure_protected();
        let snapshot = self.controller.snapshot();
        self.description.clone_from(&snapshot.description);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(status_line(
                &snapshot.state,
                snapshot.screenshots.len(),
                snapshot.protected,
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| match &snapshot.state {
            WorkflowState::Idle => self.render_compose_ui(ui, &snapshot, &mut actions),
            WorkflowState::Capturing => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Capturing...");
                });
            }
            WorkflowState::Analyzing => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Analyzing...");
                });
            }
            WorkflowState::ShowingResult(result) => self.render_result_ui(ui, result, &mut actions),
            WorkflowState::ShowingError(message) => self.render_error_ui(ui, message, &mut actions),
        });

        for action in actions {
            self.apply(action);
        }

        let copy_available = self.controller.copyable_solution().is_some();
        if let Some(dispatcher) = &mut self.dispatcher {
            dispatcher.sync_copy_binding(copy_available);
        }

        // Hotkey events arrive on a channel, not as window input
        ctx.request_repaint_after(POLL_INTERVAL);
    }
}

/// Opens the main window and blocks until it is closed.
///
/// # Errors
///
/// Returns an error for invalid shortcut bindings, a backend that cannot be
/// built, or a window that fails to open.
pub fn run(config: Config, runtime: Handle) -> Result<()> {
    let bindings = ShortcutBindings::from_config(&config.shortcuts)?;
    let backend = Backend::from_config(&config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("shade-shot")
            .with_inner_size([420.0, 560.0])
            .with_always_on_top()
            .with_taskbar(false),
        ..Default::default()
    };

    eframe::run_native(
        "shade-shot",
        options,
        Box::new(move |cc| {
            Ok(Box::new(MainView::new(&cc.egui_ctx, &config, backend, bindings, runtime))
                as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
