use serde::Deserialize;
use tracing::metadata::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetryConfig {
    #[serde(default = "default_enabled")]
    pub enable: bool,
    #[serde(default)]
    pub max_level: LoggingLevel,
    /// Extra filter directives, e.g. `aws_smithy_runtime=warn`.
    #[serde(default)]
    pub level_filter: String,
    /// Print file, line, thread and target with each event.
    #[serde(default)]
    pub enable_debug_logging: bool,
    #[serde(default)]
    pub file: FileConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable: default_enabled(),
            max_level: Default::default(),
            level_filter: Default::default(),
            enable_debug_logging: Default::default(),
            file: Default::default(),
        }
    }
}

#[derive(Default, Deserialize, Clone, Copy, Debug)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    Off,
}

impl From<LoggingLevel> for LevelFilter {
    fn from(val: LoggingLevel) -> Self {
        match val {
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
            LoggingLevel::Off => LevelFilter::OFF,
        }
    }
}

impl From<LoggingLevel> for Directive {
    fn from(val: LoggingLevel) -> Self {
        let level: LevelFilter = val.into();
        level.into()
    }
}

/// Rolling log file output.
#[derive(Deserialize, Clone, Debug)]
pub struct FileConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "FileConfig::default_path")]
    pub path: String,
    #[serde(default = "FileConfig::default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: RollingTime,
}

impl FileConfig {
    fn default_path() -> String {
        "logs".to_string()
    }
    fn default_prefix() -> String {
        "upload-server.log".to_string()
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enable: false,
            path: Self::default_path(),
            prefix: Self::default_prefix(),
            rotation: Default::default(),
        }
    }
}

#[derive(Default, Deserialize, Clone, Copy, Debug)]
pub enum RollingTime {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<RollingTime> for Rotation {
    fn from(val: RollingTime) -> Self {
        match val {
            RollingTime::Minutely => Rotation::MINUTELY,
            RollingTime::Hourly => Rotation::HOURLY,
            RollingTime::Daily => Rotation::DAILY,
            RollingTime::Never => Rotation::NEVER,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.max_level.into())
        .parse_lossy(config.level_filter.as_str())
}

pub fn initialize_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    if !config.enable {
        return Ok(());
    }
    let debug = config.enable_debug_logging;
    let console = tracing_subscriber::fmt::layer()
        .with_file(debug)
        .with_line_number(debug)
        .with_thread_ids(debug)
        .with_target(debug)
        .with_filter(filter(config));
    let file = config.file.enable.then(|| {
        let appender = RollingFileAppender::new(
            config.file.rotation.into(),
            &config.file.path,
            &config.file.prefix,
        );
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .with_file(debug)
            .with_line_number(debug)
            .with_thread_ids(debug)
            .with_target(debug)
            .with_filter(filter(config))
    });
    Registry::default().with(console).with(file).try_init()?;
    Ok(())
}
