use std::io::{self, Write};

use tracing::{Level, Metadata, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{MakeWriter, layer},
    layer::SubscriberExt,
    registry,
    util::SubscriberInitExt,
};

/// Routes WARN and ERROR records to stderr, everything else to stdout.
struct SplitWriter;

impl<'a> MakeWriter<'a> for SplitWriter {
    type Writer = Box<dyn Write>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(io::stdout())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        if *meta.level() <= Level::WARN {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        }
    }
}

pub fn init() {
    registry()
        .with(
            layer()
                .without_time()
                .with_ansi(cfg!(debug_assertions))
                .with_writer(SplitWriter)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(LevelFilter::INFO.into())
                        .from_env_lossy(),
                ),
        )
        .init()
}
