use serde::Serialize;

use crate::configs::Config;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Build metadata captured by `build.rs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub commit_time: u64,
    pub build_time: u64,
    pub profile: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
            commit_time: option_env!("GIT_COMMIT_TIME")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
            build_time: option_env!("BUILD_TIME")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

impl BuildInfo {
    pub fn commit_short(&self) -> &str {
        self.commit.get(..7).unwrap_or(self.commit)
    }
}

pub fn print_banner(info: &BuildInfo, config: &Config) {
    println!();
    println!("{GREEN}{BOLD}  anistream{RESET} {DIM}hls relay + source resolver{RESET}");
    println!("{DIM}========================================{RESET}");
    println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit_short(), RESET);
    print_row("Profile", info.profile, YELLOW);
    print_row(
        "Listen",
        &format!("{}:{}", config.server.host, config.server.port),
        RESET,
    );
    print_row("Cache mode", config.relay.cache_mode.as_str(), RESET);
    println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {BOLD}{label:<14}{RESET}{color}{value}{RESET}");
}
