//! logger.rs
//! Configuración del logger usando env_logger.

/// `RUST_LOG` manda; si no está, `info` (o `debug` con `APP_DEBUG=true`).
pub fn init_logger(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}
