use colored::Colorize;
use env_logger::Builder;
use log::Level;
use std::io::Write;

use super::config::PackagePaths;

/// Crate at Debug when `verbose`, Info otherwise; dependencies at Warn. `RUST_LOG` still applies.
/// Worker threads are tagged with their thread name.
pub fn setup_logging(verbose: bool) {
    use log::LevelFilter;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(PackagePaths::get().pkg_name(), level)
        .format(|buf, record| {
            let name = PackagePaths::get().pkg_name();
            let thread = std::thread::current();
            let worker = thread
                .name()
                .filter(|n| n.starts_with("job-worker"))
                .map(|n| format!(" {}", n.dimmed()))
                .unwrap_or_default();
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = if record.level() == Level::Warn {
                        "WARN".yellow()
                    } else {
                        "ERROR".red()
                    };
                    let path = record.target().to_string().white();
                    format!(
                        "[{}{} {} {}] {}",
                        name.cyan(),
                        worker,
                        level_str,
                        path,
                        record.args()
                    )
                }
                Level::Debug | Level::Trace => {
                    format!("[{}{}] {}", name.cyan(), worker, record.args().to_string().dimmed())
                }
                Level::Info => format!("[{}{}] {}", name.cyan(), worker, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
