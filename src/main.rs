mod app;
mod audio;
mod config;
mod download;
mod error;
mod library;
mod logging;
mod mpris;
mod playlist;
mod queue;
mod runtime;
mod ui;

fn main() {
    if let Err(e) = runtime::run() {
        eprintln!("cadence: {e}");
        std::process::exit(1);
    }
}
