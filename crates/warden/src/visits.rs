//! Visit writer
//!
//! Drains the visit queue on its own thread so that slow output never
//! reaches the pump. JSON visits are the only thing written to stdout; logs
//! go to stderr.

use crate::config::ReportFormat;
use crossbeam_channel::Receiver;
use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use warden_filter::Visit;

/// Start the writer thread. It exits once every sender is gone.
pub fn spawn_writer(visits: Receiver<Visit>, format: ReportFormat) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("warden-visits".to_string())
        .spawn(move || {
            // Unlocked handle: each line takes the stdout lock only while it is written
            let written = write_visits(&visits, format, io::stdout());
            info!("Visit writer stopped after {} visits", written);
        })
}

/// Write every visit until the channel closes, returning how many were written
pub fn write_visits<W: Write>(visits: &Receiver<Visit>, format: ReportFormat, mut out: W) -> u64 {
    let mut written = 0;

    for visit in visits.iter() {
        match format {
            ReportFormat::Log => {
                let verdict = if visit.blocked { "blocked" } else { "allowed" };
                info!("{} {} ({})", verdict, visit.host, visit.source);
            }
            ReportFormat::Json => {
                let line = match serde_json::to_string(&visit) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to encode visit for {}: {}", visit.host, e);
                        continue;
                    }
                };
                if let Err(e) = writeln!(out, "{}", line).and_then(|()| out.flush()) {
                    warn!("Visit output closed: {}", e);
                    break;
                }
            }
        }
        written += 1;
    }

    written
}
