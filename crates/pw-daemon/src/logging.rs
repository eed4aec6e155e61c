//! Tracing subscriber setup shared by the `pw-daemon` and `pw` binaries.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Logs go to stderr without ANSI colours. `RUST_LOG` directives are
/// combined with `<crate>=info` for each crate in `crates`. With `json`,
/// each event is one JSON object per line.
pub fn init(json: bool, crates: &[&str]) -> Result<(), ParseError> {
    let mut filter = EnvFilter::from_default_env();
    for name in crates {
        filter = filter.add_directive(format!("{name}=info").parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
