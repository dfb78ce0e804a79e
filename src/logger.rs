use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

// The wgpu crate is logging too much at the `info` level.
const DEFAULT_FILTER: &str = "info,wgpu=warn,wgpu_core=warn";

/// If a global tracing subscriber is not already configured, log to the standard error with the
/// `RUST_LOG` filter, and add our custom panic hook.
///
/// Records of the `log` facade are forwarded to the same subscriber. Returns whether the subscriber
/// was installed by this call.
pub fn install_logger() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let installed = registry().with(filter).with(layer).try_init().is_ok();
    if installed {
        update_panic_hook();
    }
    installed
}

fn update_panic_hook() {
    let hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        hook(info);
    }));
}
