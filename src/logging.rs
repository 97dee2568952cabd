//! # Logging モジュール
//!
//! 実行ログ（進行状況・再計画・異常値注入など）の出力先を切り替えます。
//! センサーレコードは `output` モジュールがCSVに書き出し、ここでは扱いません。
//!
//! | 出力先 | 形式 |
//! |---|---|
//! | `Console` | 標準エラーへのコンパクト表示 |
//! | `File` | `<log_dir>/<prefix>.YYYY-MM-DD` へのJSON行（日次ローテーション） |
//! | `Both` | 上記の両方 |
//!
//! 環境変数 `RUST_LOG` が設定されていれば、`LogConfig::level` より優先されます。

use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    fn to_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            other => Err(format!("ログ出力先が不正です: '{}' (console, file, both)", other)),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    /// ファイル出力時のディレクトリ
    pub log_dir: PathBuf,
    /// ローテーションファイル名の接頭辞
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            output: LogOutput::Console,
            log_dir: PathBuf::from("logs"),
            file_prefix: "ikasim".to_string(),
        }
    }
}

/// グローバルなtracingサブスクライバーを設定
///
/// ファイルに出力する場合は非同期ライターの `WorkerGuard` を返します。
/// ガードが破棄されるとバッファが書き出されるので、実行終了まで保持してください。
///
/// ```no_run
/// use ikasim::logging::{LogConfig, LogOutput, init_logging};
///
/// let _guard = init_logging(LogConfig {
///     output: LogOutput::Both,
///     ..LogConfig::default()
/// })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.level.as_str().to_ascii_lowercase()),
    };

    let console = config.output.to_console().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let (file, guard) = if config.output.to_file() {
        ensure_log_directory(&config.log_dir)?;
        let (writer, guard) = non_blocking(rolling::daily(&config.log_dir, &config.file_prefix));
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_current_span(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default().with(filter).with(console).with(file).try_init()?;
    Ok(guard)
}

/// `--log-level` の値を解析
pub fn parse_log_level(value: &str) -> Result<Level, String> {
    Level::from_str(value.trim()).map_err(|_| {
        format!("ログレベルが不正です: '{}' (trace, debug, info, warn, error)", value)
    })
}

/// `-v` の回数からログレベルを決定（0: WARN, 1: INFO, 2: DEBUG, 3以上: TRACE）
pub fn level_from_verbosity(verbose_level: u8) -> Level {
    match verbose_level {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn ensure_log_directory(log_dir: impl AsRef<std::path::Path>) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)
}
