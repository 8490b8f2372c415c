//! deckchat Desktop — application entry.

use eframe::egui;

mod app;

fn main() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([600.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "deckchat",
        options,
        Box::new(|cc| Box::new(app::DeckchatApp::new(cc))),
    )
}
