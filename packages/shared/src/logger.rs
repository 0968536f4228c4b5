//! Logging setup utilities for the Hiroba fan-out server.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are enabled at the default level.
const LOG_TARGETS: [&str; 3] = ["hiroba_server", "hiroba_shared", "tower_http"];

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Binary names use dashes while tracing targets use underscores, so the
/// binary name is normalized before being added.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, default_log_level))
        .collect();
    if !LOG_TARGETS.contains(&binary_target.as_str()) {
        directives.push(format!("{}={}", binary_target, default_log_level));
    }
    directives.join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "hiroba-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use hiroba_shared::logger::setup_logger;
///
/// setup_logger("hiroba-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_includes_library_targets() {
        // テスト項目: デフォルトのフィルタにライブラリのターゲットが含まれる
        // given (前提条件):
        let level = "debug";

        // when (操作):
        let directive = default_directive("hiroba-server", level);

        // then (期待する結果):
        assert!(directive.contains("hiroba_server=debug"));
        assert!(directive.contains("hiroba_shared=debug"));
        assert!(directive.contains("tower_http=debug"));
    }

    #[test]
    fn test_default_directive_does_not_duplicate_binary_target() {
        // テスト項目: バイナリ名がライブラリ名と同じ場合、重複して追加されない
        // given (前提条件):

        // when (操作):
        let directive = default_directive("hiroba-server", "info");

        // then (期待する結果):
        assert_eq!(directive.matches("hiroba_server=").count(), 1);
    }

    #[test]
    fn test_default_directive_adds_other_binary_target() {
        // テスト項目: 別名のバイナリはアンダースコアに正規化されて追加される
        // given (前提条件):

        // when (操作):
        let directive = default_directive("load-meter", "warn");

        // then (期待する結果):
        assert!(directive.ends_with("load_meter=warn"));
    }
}
