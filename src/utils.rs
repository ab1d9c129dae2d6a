use indicatif::ProgressStyle;
use indicatif::style::TemplateError;

/// Style of the overall build progress bar.
pub(crate) fn get_style_build() -> Result<ProgressStyle, TemplateError> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("=>-"))
}

/// Style of the spinner shown for each running target.
pub(crate) fn get_style_task() -> Result<ProgressStyle, TemplateError> {
    ProgressStyle::default_spinner().template("{spinner:.blue} {msg}")
}

/// Installs a global `tracing` subscriber that cooperates with the progress
/// bars. Honors `RUST_LOG`, defaulting to `info`.
///
/// Fails if `RUST_LOG` can't be parsed, or if a global subscriber has already
/// been installed (including by an earlier call).
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new("info"),
    };

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_compile() {
        assert!(get_style_build().is_ok());
        assert!(get_style_task().is_ok());
    }

    #[cfg(feature = "logging")]
    #[test]
    fn test_init_logging_only_once() {
        init_logging().unwrap();
        assert!(init_logging().is_err());
    }
}
