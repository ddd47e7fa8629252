//! Global keyboard shortcuts.
//!
//! Three bindings drive the workflow from anywhere on the desktop:
//! capture, analyze and copy-result. Capture and analyze stay registered for
//! as long as the [`ShortcutDispatcher`] lives. Copy is only registered
//! while there is a solution to copy, so the key combination keeps its
//! usual meaning in other applications the rest of the time.
//!
//! Dropping the dispatcher unregisters everything it registered.

use crate::analysis::AnalysisClient;
use crate::capture::ScreenSource;
use crate::clipboard::ClipboardSink;
use crate::error::{AppError, Result};
use crate::settings::ShortcutConfig;
use crate::window::WindowAttributes;
use crate::workflow::WorkflowController;
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const LETTERS: [Code; 26] = [
    Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
    Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
    Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
    Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
];

const DIGITS: [Code; 10] = [
    Code::Digit0, Code::Digit1, Code::Digit2, Code::Digit3, Code::Digit4,
    Code::Digit5, Code::Digit6, Code::Digit7, Code::Digit8, Code::Digit9,
];

const FUNCTION_KEYS: [Code; 12] = [
    Code::F1, Code::F2, Code::F3, Code::F4, Code::F5, Code::F6,
    Code::F7, Code::F8, Code::F9, Code::F10, Code::F11, Code::F12,
];

/// Parse a shortcut string like `"Ctrl+Alt+X"` into a `HotKey`.
///
/// # Errors
///
/// Returns [`AppError::Shortcut`] for unknown keys, a missing key, or more
/// than one non-modifier key.
pub fn parse_shortcut(s: &str) -> Result<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut key_code: Option<Code> = None;

    for token in s.split('+').map(str::trim) {
        match token.to_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" | "option" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "super" | "win" | "meta" | "cmd" => modifiers |= Modifiers::SUPER,
            _ => {
                if key_code.is_some() {
                    return Err(AppError::shortcut(format!("multiple keys in shortcut {s:?}")));
                }
                key_code = Some(parse_key_code(token)?);
            }
        }
    }

    let code = key_code.ok_or_else(|| AppError::shortcut(format!("no key in shortcut {s:?}")))?;
    let mods = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(mods, code))
}

fn parse_key_code(token: &str) -> Result<Code> {
    let mut chars = token.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            return Ok(LETTERS[(ch.to_ascii_uppercase() as u8 - b'A') as usize]);
        }
        if ch.is_ascii_digit() {
            return Ok(DIGITS[(ch as u8 - b'0') as usize]);
        }
    }

    let lower = token.to_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        if (1..=FUNCTION_KEYS.len()).contains(&n) {
            return Ok(FUNCTION_KEYS[n - 1]);
        }
    }

    match lower.as_str() {
        "space" => Ok(Code::Space),
        "enter" | "return" => Ok(Code::Enter),
        "tab" => Ok(Code::Tab),
        "escape" | "esc" => Ok(Code::Escape),
        "backspace" => Ok(Code::Backspace),
        "delete" | "del" => Ok(Code::Delete),
        "insert" | "ins" => Ok(Code::Insert),
        "home" => Ok(Code::Home),
        "end" => Ok(Code::End),
        "pageup" => Ok(Code::PageUp),
        "pagedown" => Ok(Code::PageDown),
        "up" => Ok(Code::ArrowUp),
        "down" => Ok(Code::ArrowDown),
        "left" => Ok(Code::ArrowLeft),
        "right" => Ok(Code::ArrowRight),
        _ => Err(AppError::shortcut(format!("unknown key {token:?}"))),
    }
}

/// What a shortcut asks the workflow to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortcutAction {
    Capture,
    Analyze,
    CopyResult,
}

/// Parsed key combinations for the three actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortcutBindings {
    pub capture: HotKey,
    pub analyze: HotKey,
    pub copy_result: HotKey,
}

impl ShortcutBindings {
    /// # Errors
    ///
    /// Returns [`AppError::Shortcut`] if a binding does not parse or two
    /// actions share a combination.
    pub fn from_config(config: &ShortcutConfig) -> Result<Self> {
        let bindings = Self {
            capture: parse_shortcut(&config.capture)?,
            analyze: parse_shortcut(&config.analyze)?,
            copy_result: parse_shortcut(&config.copy_result)?,
        };
        let ids = [bindings.capture.id(), bindings.analyze.id(), bindings.copy_result.id()];
        if ids[0] == ids[1] || ids[0] == ids[2] || ids[1] == ids[2] {
            return Err(AppError::shortcut("two actions are bound to the same keys"));
        }
        Ok(bindings)
    }
}

/// OS-level hotkey registration.
pub trait HotKeyRegistrar {
    fn register(&self, hotkey: HotKey) -> std::result::Result<(), String>;
    fn unregister(&self, hotkey: HotKey) -> std::result::Result<(), String>;
}

impl HotKeyRegistrar for GlobalHotKeyManager {
    fn register(&self, hotkey: HotKey) -> std::result::Result<(), String> {
        GlobalHotKeyManager::register(self, hotkey).map_err(|e| e.to_string())
    }

    fn unregister(&self, hotkey: HotKey) -> std::result::Result<(), String> {
        GlobalHotKeyManager::unregister(self, hotkey).map_err(|e| e.to_string())
    }
}

/// Owns the registered shortcuts and maps their events to actions.
pub struct ShortcutDispatcher<R: HotKeyRegistrar> {
    registrar: R,
    bindings: ShortcutBindings,
    registered: Vec<HotKey>,
    copy_active: bool,
    copy_failed: bool,
}

impl<R: HotKeyRegistrar> ShortcutDispatcher<R> {
    /// Registers the capture and analyze shortcuts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Shortcut`] if either registration fails. Whatever
    /// was registered before the failure is unregistered again.
    pub fn new(registrar: R, bindings: ShortcutBindings) -> Result<Self> {
        let mut dispatcher = Self {
            registrar,
            bindings,
            registered: Vec::new(),
            copy_active: false,
            copy_failed: false,
        };
        for hotkey in [bindings.capture, bindings.analyze] {
            dispatcher
                .registrar
                .register(hotkey)
                .map_err(|e| AppError::shortcut(format!("failed to register {hotkey:?}: {e}")))?;
            dispatcher.registered.push(hotkey);
        }
        log::info!("Global shortcuts registered");
        Ok(dispatcher)
    }

    /// Maps a hotkey event to an action. Releases and foreign ids map to
    /// nothing.
    pub fn action_for(&self, event: &GlobalHotKeyEvent) -> Option<ShortcutAction> {
        if event.state != HotKeyState::Pressed {
            return None;
        }
        if event.id == self.bindings.capture.id() {
            Some(ShortcutAction::Capture)
        } else if event.id == self.bindings.analyze.id() {
            Some(ShortcutAction::Analyze)
        } else if self.copy_active && event.id == self.bindings.copy_result.id() {
            Some(ShortcutAction::CopyResult)
        } else {
            None
        }
    }

    /// Registers the copy shortcut while a solution can be copied and
    /// releases it otherwise.
    pub fn sync_copy_binding(&mut self, copy_available: bool) {
        if !copy_available {
            self.copy_failed = false;
        }
        if copy_available == self.copy_active {
            return;
        }
        let hotkey = self.bindings.copy_result;

        if copy_available {
            if self.copy_failed {
                return;
            }
            match self.registrar.register(hotkey) {
                Ok(()) => {
                    self.registered.push(hotkey);
                    self.copy_active = true;
                    log::debug!("Copy shortcut armed");
                }
                Err(e) => {
                    log::warn!("Failed to register copy shortcut: {}", e);
                    self.copy_failed = true;
                }
            }
        } else {
            self.copy_active = false;
            self.registered.retain(|h| h.id() != hotkey.id());
            if let Err(e) = self.registrar.unregister(hotkey) {
                log::warn!("Failed to unregister copy shortcut: {}", e);
            } else {
                log::debug!("Copy shortcut released");
            }
        }
    }

    pub fn bindings(&self) -> &ShortcutBindings {
        &self.bindings
    }

    pub fn is_copy_active(&self) -> bool {
        self.copy_active
    }
}

impl<R: HotKeyRegistrar> Drop for ShortcutDispatcher<R> {
    fn drop(&mut self) {
        for hotkey in self.registered.drain(..) {
            if let Err(e) = self.registrar.unregister(hotkey) {
                log::warn!("Failed to unregister shortcut {:?}: {}", hotkey, e);
            }
        }
        log::info!("Global shortcuts unregistered");
    }
}

/// Result of dispatching an action.
#[derive(Debug)]
pub enum Dispatch {
    /// A capture or analysis was started on the runtime.
    Started(JoinHandle<bool>),
    /// The solution went to the clipboard (or the write failed and was
    /// logged).
    Copied,
    /// Nothing to do right now; the key press keeps its default behaviour.
    Ignored,
}

/// Runs `action` against the controller.
///
/// Capture and analysis are spawned on `runtime` and guarded by the
/// controller's own checks; copy happens synchronously.
pub fn dispatch<W, S, A>(
    action: ShortcutAction,
    controller: &Arc<WorkflowController<W, S, A>>,
    clipboard: &dyn ClipboardSink,
    runtime: &Handle,
) -> Dispatch
where
    W: WindowAttributes + 'static,
    S: ScreenSource,
    A: AnalysisClient,
{
    match action {
        ShortcutAction::Capture => {
            if !controller.can_capture() {
                log::debug!("Capture shortcut ignored: busy");
                return Dispatch::Ignored;
            }
            let controller = Arc::clone(controller);
            Dispatch::Started(runtime.spawn(async move { controller.request_capture().await }))
        }
        ShortcutAction::Analyze => {
            if !controller.can_analyze() {
                log::debug!("Analyze shortcut ignored: busy or nothing captured");
                return Dispatch::Ignored;
            }
            let controller = Arc::clone(controller);
            Dispatch::Started(runtime.spawn(async move { controller.request_analysis().await }))
        }
        ShortcutAction::CopyResult => {
            let Some(solution) = controller.copyable_solution() else {
                return Dispatch::Ignored;
            };
            match clipboard.set_text(&solution) {
                Ok(()) => log::info!("Solution copied to clipboard ({} chars)", solution.len()),
                Err(e) => log::warn!("Could not copy solution: {}", e),
            }
            Dispatch::Copied
        }
    }
}

/// Drains pending OS hotkey events into actions.
pub fn pending_actions<R: HotKeyRegistrar>(dispatcher: &ShortcutDispatcher<R>) -> Vec<ShortcutAction> {
    let mut actions = Vec::new();
    while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
        log::trace!("Hotkey event: {:?}", event);
        actions.extend(dispatcher.action_for(&event));
    }
    actions
}
