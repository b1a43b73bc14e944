use log::LevelFilter;

/// Install the global logger. `RUST_LOG` directives override the default level.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if builder.try_init().is_err() {
        log::debug!("logger already installed");
    }
}
