//! Startup banner and session summary display.

use crate::bus::EventBus;
use crate::consts::{AUTHOR, HOMEPAGE, REPO};

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub config: &'a str,
    pub bus_history: usize,
    pub selection_trace: usize,
    pub undo_limit: usize,
    pub middleware: &'a [&'a str],
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║           G R A P H B U S             ║
   ║   events in, selection and undo out   ║
   ╚═══════════════════════════════════════╝

   version     {}
   by          {}
   home        {}
   repo        {}
   config      {}
   history     {} events
   trace       {} entries
   undo        {} actions
   middleware  {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.config,
        info.bus_history,
        info.selection_trace,
        info.undo_limit,
        if info.middleware.is_empty() {
            "none".to_string()
        } else {
            info.middleware.join(", ")
        },
    );
}

/// Print the session summary (bus activity + farewell).
pub fn print_session_summary(bus: &EventBus) {
    let recorded = bus.history(None, None).len();
    if recorded > 0 {
        println!(
            "session: {} event(s) in history, {} live subscription(s)",
            recorded,
            bus.subscriber_count(),
        );
    }
    println!("goodbye.");
}
