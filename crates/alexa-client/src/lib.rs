pub mod avs;
pub mod client;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod models;
pub mod session;
pub mod smart_home;
pub mod transport;

pub use client::AlexaClient;
pub use config::{ClientConfig, ConfigError, Endpoints, RefreshSecret};
pub use correlation::{Clock, PollPolicy, SystemClock};
pub use dispatch::Command;
pub use error::AlexaError;
pub use models::{
    Conversation, ConversationFragment, ConversationResponse, Device, HistoryRecord, Routine,
    SmartHomeDevice,
};
pub use smart_home::SmartHomeAction;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn credential_paths_do_not_log_secret_material() {
        let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
        let files = [
            src.join("client.rs"),
            src.join("session.rs"),
            src.join("transport.rs"),
            src.join("correlation.rs"),
            src.join("avs/mod.rs"),
        ];

        for file in files {
            let content = fs::read_to_string(&file)
                .expect("failed to read source file for secret logging guard test");
            assert_no_sensitive_tracing_args(file.display().to_string().as_str(), &content);
        }
    }

    fn assert_no_sensitive_tracing_args(path: &str, content: &str) {
        const TRACING_MACROS: [&str; 5] = ["trace!(", "debug!(", "info!(", "warn!(", "error!("];
        const SENSITIVE_TERMS: [&str; 6] = [
            "refresh_token",
            "refresh_secret",
            "access_token",
            "bearer_token",
            "expose(",
            "cookies()",
        ];

        for macro_call in TRACING_MACROS {
            let mut from = 0;
            while let Some(start_offset) = content[from..].find(macro_call) {
                let start = from + start_offset;
                let Some(end_offset) = content[start..].find(");") else {
                    break;
                };
                let end = start + end_offset + 2;
                let snippet = content[start..end].to_ascii_lowercase();

                for term in SENSITIVE_TERMS {
                    assert!(
                        !snippet.contains(term),
                        "{path} contains sensitive term `{term}` in tracing macro: {snippet}"
                    );
                }

                from = end;
            }
        }
    }
}
