//! Display surface and headless tray shell

pub mod notifications;
mod surface;
mod tray;

pub use notifications::LogSurface;
#[cfg(test)]
pub use surface::testing;
pub use surface::DisplaySurface;
pub use tray::TrayShell;
