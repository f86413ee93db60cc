// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use serial_test::serial;

use super::{host_is_loopback, Config};

fn config_from(args: &[&str]) -> Config {
    let mut argv = vec!["agmux"];
    argv.extend_from_slice(args);
    Config::parse_from(argv)
}

#[yare::parameterized(
    v4 = { "127.0.0.1", true },
    v4_high = { "127.1.2.3", true },
    localhost = { "localhost", true },
    v6 = { "::1", true },
    v6_bracketed = { "[::1]", true },
    wildcard = { "0.0.0.0", false },
    lan = { "192.168.1.10", false },
    hostname = { "example.com", false },
)]
fn loopback_detection(host: &str, expected: bool) {
    assert_eq!(host_is_loopback(host), expected);
}

#[test]
#[serial]
fn non_loopback_host_is_fatal() {
    std::env::remove_var("ALLOW_NON_LOOPBACK");
    let config = config_from(&["--host", "0.0.0.0"]);
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn non_loopback_host_allowed_with_override() {
    std::env::set_var("ALLOW_NON_LOOPBACK", "1");
    let config = config_from(&["--host", "0.0.0.0"]);
    assert!(config.validate().is_ok());
    std::env::remove_var("ALLOW_NON_LOOPBACK");
}

#[test]
fn token_is_none_when_auth_disabled() {
    let config = config_from(&[]);
    assert_eq!(config.effective_token(), None);
}

#[test]
fn configured_token_wins() {
    let config = config_from(&["--auth", "--auth-token", "secret"]);
    assert_eq!(config.effective_token().as_deref(), Some("secret"));
}

#[test]
fn generated_token_is_32_byte_hex() {
    let config = config_from(&["--auth"]);
    let token = config.effective_token().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn allowed_origins_include_loopback_defaults() {
    let config = config_from(&["--port", "9000", "--allow-origin", "https://app.example"]);
    let origins = config.allowed_origins();
    assert!(origins.contains(&"https://app.example".to_owned()));
    assert!(origins.contains(&"http://127.0.0.1:9000".to_owned()));
    assert!(origins.contains(&"http://localhost:9000".to_owned()));
    assert!(origins.contains(&"http://[::1]:9000".to_owned()));
}

#[test]
fn inactive_age_is_clamped() {
    let config = config_from(&["--inactive-max-age-hours", "500"]);
    assert_eq!(config.inactive_max_age_hours_clamped(), 168);
}
