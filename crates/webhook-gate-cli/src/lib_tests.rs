//! Tests for the webhook-gate-cli library module.

use super::*;
use chrono::TimeZone;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

// ============================================================================
// Argument parsing
// ============================================================================

mod parsing_tests {
    use super::*;

    #[test]
    fn test_sign_parsing() {
        let cli = parse(&["webhook-gate-cli", "sign", "--secret", "whsec", "--file", "body.json"]);
        match cli.command {
            Commands::Sign { secret, file } => {
                assert_eq!(secret, "whsec");
                assert_eq!(file, Some(PathBuf::from("body.json")));
            }
            _ => panic!("Expected Sign command"),
        }
    }

    #[test]
    fn test_send_defaults() {
        let cli = parse(&[
            "webhook-gate-cli",
            "send",
            "--url",
            "http://localhost:8080",
            "--secret",
            "whsec",
            "--tenant",
            "acme-corp",
        ]);
        match cli.command {
            Commands::Send {
                endpoint,
                data,
                header,
                timeout,
                ..
            } => {
                assert_eq!(endpoint, "default");
                assert!(data.is_none());
                assert_eq!(header, "x-webhook-signature");
                assert_eq!(timeout, 10);
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "webhook-gate-cli",
            "completions",
            "bash",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        assert_eq!(cli.log_level, "debug");
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Completions { .. }));
    }

    #[test]
    fn test_reset_requires_endpoint() {
        let result = Cli::try_parse_from([
            "webhook-gate-cli",
            "reset",
            "--url",
            "http://localhost:8080",
            "--token",
            "admin-token-0123456789",
            "--tenant",
            "acme-corp",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}

// ============================================================================
// Request construction
// ============================================================================

mod request_tests {
    use super::*;

    #[test]
    fn test_build_payload_carries_tenant_and_timestamp() {
        let tenant = TenantId::new("acme-corp").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 8, 43, 40).unwrap();

        let body = build_payload(&tenant, now);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["tenant_id"], "acme-corp");
        assert_eq!(value["created_at"], "2025-11-03T08:43:40Z");
    }

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let tenant = TenantId::new("acme-corp").unwrap();
        let endpoint = EndpointId::new("tickets").unwrap();

        assert_eq!(
            webhook_url("http://localhost:8080/", &endpoint),
            "http://localhost:8080/webhooks/tickets"
        );
        assert_eq!(
            reset_url("http://localhost:8080", &tenant, &endpoint),
            "http://localhost:8080/admin/rate-limits/acme-corp/tickets/reset"
        );
    }
}

// ============================================================================
// Command validation
// ============================================================================

mod command_tests {
    use super::*;

    /// Verify that a malformed tenant is rejected before any request is made.
    #[tokio::test]
    async fn test_send_rejects_invalid_tenant() {
        let cli = parse(&[
            "webhook-gate-cli",
            "send",
            "--url",
            "http://127.0.0.1:9",
            "--secret",
            "whsec",
            "--tenant",
            "ACME",
        ]);

        let result = run(cli).await;

        assert!(
            matches!(result, Err(CliError::InvalidArgument { ref arg, .. }) if arg == "tenant"),
            "{:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_reset_rejects_invalid_endpoint() {
        let cli = parse(&[
            "webhook-gate-cli",
            "reset",
            "--url",
            "http://127.0.0.1:9",
            "--token",
            "admin-token-0123456789",
            "--tenant",
            "acme-corp",
            "--endpoint",
            "tick!ets",
        ]);

        let result = run(cli).await;

        assert!(matches!(
            result,
            Err(CliError::InvalidArgument { ref arg, .. }) if arg == "endpoint"
        ));
    }

    #[tokio::test]
    async fn test_empty_secret_is_rejected() {
        let cli = parse(&["webhook-gate-cli", "sign", "--secret", "", "--file", "unused"]);
        assert!(matches!(
            run(cli).await,
            Err(CliError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_timeout_is_rejected() {
        let cli = parse(&[
            "webhook-gate-cli",
            "send",
            "--url",
            "http://127.0.0.1:9",
            "--secret",
            "whsec",
            "--tenant",
            "acme-corp",
            "--timeout",
            "0",
        ]);
        assert!(matches!(
            run(cli).await,
            Err(CliError::InvalidArgument { ref arg, .. }) if arg == "timeout"
        ));
    }
}
