//! stderr logging with elapsed-time stamps: `[HH:MM:SS] LEVEL: message`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Install the global logger. `verbosity` 0 logs warnings, 1 adds info, 2 and
/// up add debug. `RUST_LOG` still applies on top. A second call is a no-op.
pub fn init_logger(verbosity: u8) {
    START_TIME.get_or_init(Instant::now);

    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let elapsed = START_TIME.get().map(Instant::elapsed).unwrap_or_default();
            let secs = elapsed.as_secs();
            writeln!(
                buf,
                "[{:02}:{:02}:{:02}] {}: {}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .try_init();
}
