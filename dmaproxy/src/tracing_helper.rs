use std::{num::NonZeroU8, panic, path::Path, sync::Once};

use time::format_description::well_known::{iso8601, Iso8601};
use tracing::error;
use tracing_subscriber::{
    fmt::time::LocalTime, prelude::__tracing_subscriber_SubscriberExt, EnvFilter, Layer,
};

const MY_CONFIG: iso8601::EncodedConfig = iso8601::Config::DEFAULT
    .set_time_precision(iso8601::TimePrecision::Second {
        decimal_digits: NonZeroU8::new(3),
    })
    .encode();

static INIT: Once = Once::new();

fn filter_directives() -> String {
    let level = if cfg!(debug_assertions) {
        "trace"
    } else {
        "info"
    };
    format!("{}={level},dmaproxy_lib={level}", env!("CARGO_CRATE_NAME"))
}

/// Installs the global subscriber on first call; later calls do nothing.
pub fn init_tracing(dir: &Path, file_name: &str) {
    INIT.call_once(|| {
        let default_layer = || {
            const WITH_FILE_PATH: bool = cfg!(debug_assertions);
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(WITH_FILE_PATH)
                .with_line_number(WITH_FILE_PATH)
                .with_target(!WITH_FILE_PATH)
                .with_thread_ids(true)
                .with_timer(LocalTime::new(Iso8601::<MY_CONFIG>))
        };
        let writer = tracing_appender::rolling::never(dir, file_name);
        let layer = default_layer().with_ansi(false).with_writer(writer);
        let make_filter = || EnvFilter::new(filter_directives());

        let result = if cfg!(debug_assertions) {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(
                    layer.with_filter(make_filter()).and_then(
                        default_layer()
                            .with_writer(std::io::stderr)
                            .with_filter(make_filter()),
                    ),
                ),
            )
        } else {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(layer.with_filter(make_filter())),
            )
        };
        // the host may already own the global subscriber
        if result.is_err() {
            return;
        }

        panic::set_hook(Box::new(|panic| error!("{}", panic)));
    });
}
