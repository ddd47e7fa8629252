//! Window attribute primitives backed by the egui viewport.

use crate::error::WindowError;
use crate::window::WindowAttributes;
use eframe::egui;

/// Sends protection changes to the root viewport.
///
/// Viewport commands are applied on the next frame, which is why the
/// workflow waits a settling delay before capturing.
pub struct ViewportWindow {
    ctx: egui::Context,
}

impl ViewportWindow {
    pub fn new(ctx: egui::Context) -> Self {
        Self { ctx }
    }
}

impl WindowAttributes for ViewportWindow {
    fn set_content_protected(&self, protected: bool) -> Result<(), WindowError> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::ContentProtected(protected));
        self.ctx.request_repaint();
        Ok(())
    }

    fn set_skip_taskbar(&self, skip: bool) -> Result<(), WindowError> {
        // Fixed at window creation through `ViewportBuilder::with_taskbar(false)`
        if skip {
            Ok(())
        } else {
            Err(WindowError::SkipTaskbar {
                enabled: false,
                reason: "taskbar visibility cannot change after window creation".into(),
            })
        }
    }
}
