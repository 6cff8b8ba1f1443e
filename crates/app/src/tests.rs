use std::time::{Duration, Instant};

use svcboot_domain::{ConfigError, EnvSource, ENV_PREFIX};

use crate::application::{bootstrap, BootstrapError};

const BUSINESS_ENV: &[(&str, &str)] = &[
    ("BOILERPLATE_PRIMARY.ENV", "dev"),
    ("BOILERPLATE_SERVER.PORT", "8080"),
    ("BOILERPLATE_SERVER.READ_TIMEOUT", "30"),
    ("BOILERPLATE_SERVER.WRITE_TIMEOUT", "30"),
    ("BOILERPLATE_SERVER.IDLE_TIMEOUT", "60"),
    ("BOILERPLATE_SERVER.CORS_ALLOWED_ORIGIN", "http://localhost:3000"),
    ("BOILERPLATE_DATABASE.HOST", "db"),
    ("BOILERPLATE_DATABASE.PORT", "5432"),
    ("BOILERPLATE_DATABASE.USER", "postgres"),
    ("BOILERPLATE_DATABASE.NAME", "app"),
    ("BOILERPLATE_DATABASE.SSL_MODE", "disable"),
    ("BOILERPLATE_DATABASE.MAX_OPEN_CONNS", "25"),
    ("BOILERPLATE_DATABASE.MAX_IDLE_CONNS", "5"),
    ("BOILERPLATE_DATABASE.CONN_MAX_LIFETIME", "300"),
    ("BOILERPLATE_DATABASE.CONN_MAX_IDLE_TIME", "120"),
    ("BOILERPLATE_AUTH.SECRET_KEY", "s3cret"),
    ("BOILERPLATE_CACHE.ADDRESS", "localhost:6379"),
    ("BOILERPLATE_INTEGRATION.RESEND_API_KEY", "re_123"),
];

fn source(extra: &[(&str, &str)]) -> EnvSource {
    EnvSource::from_pairs(
        ENV_PREFIX,
        BUSINESS_ENV.iter().chain(extra.iter()).copied(),
    )
}

#[test]
fn bootstrap_without_license_key_runs_unmonitored() {
    let state = bootstrap(&source(&[])).expect("bootstrap succeeds");

    assert_eq!(state.config().env(), "dev");
    assert_eq!(state.config().server.port, "8080");
    assert_eq!(state.observability().service_name, "svcboot");
    assert!(!state.monitoring().is_enabled());
    assert!(state.logger().captures_stack());

    // 无客户端时关闭是空操作。
    state.monitoring().shutdown();
}

#[test]
fn missing_business_field_aborts_bootstrap() {
    let partial = EnvSource::from_pairs(
        ENV_PREFIX,
        BUSINESS_ENV
            .iter()
            .copied()
            .filter(|(key, _)| *key != "BOILERPLATE_AUTH.SECRET_KEY"),
    );

    match bootstrap(&partial) {
        Err(BootstrapError::Config(ConfigError::Validation { field, .. })) => {
            assert_eq!(field, "auth.secret_key");
        }
        other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn malformed_observability_value_aborts_bootstrap() {
    let source = source(&[("BOILERPLATE_OBSERVABILITY.HEALTH_CHECKS.INTERVAL", "often")]);
    let err = bootstrap(&source).err().expect("parse failure");
    match err {
        BootstrapError::Config(err @ ConfigError::Parse { .. }) => {
            assert_eq!(err.key(), Some("observability.health_checks.interval"));
        }
        other => panic!("expected parse failure, got {other:?}"),
    }
}

#[test]
fn invalid_observability_settings_only_warn() {
    let source = source(&[
        ("BOILERPLATE_OBSERVABILITY.LOGGING.LEVEL", "verbose"),
        ("BOILERPLATE_OBSERVABILITY.HEALTH_CHECKS.INTERVAL", "10ms"),
    ]);
    let state = bootstrap(&source).expect("bootstrap continues");

    assert!(state.observability().validate().is_err());
    assert_eq!(
        state.logger().level(),
        tracing::level_filters::LevelFilter::INFO
    );
}

#[test]
fn malformed_license_key_degrades_to_disabled_monitoring() {
    let source = source(&[("BOILERPLATE_OBSERVABILITY.MONITORING.LICENSE_KEY", "short")]);
    let state = bootstrap(&source).expect("bootstrap continues");
    assert!(!state.monitoring().is_enabled());
}

#[test]
fn live_monitoring_shuts_down_within_bound() {
    let key = "a".repeat(40);
    let source = source(&[
        ("BOILERPLATE_OBSERVABILITY.ENVIRONMENT", "prod"),
        ("BOILERPLATE_OBSERVABILITY.MONITORING.LICENSE_KEY", key.as_str()),
        ("BOILERPLATE_OBSERVABILITY.MONITORING.DEBUG_LOGGING", "false"),
        (
            "BOILERPLATE_OBSERVABILITY.MONITORING.ENDPOINT",
            "http://127.0.0.1:9/log/v1",
        ),
    ]);
    let state = bootstrap(&source).expect("bootstrap succeeds");
    assert!(state.monitoring().is_enabled());
    assert!(!state.logger().captures_stack());

    state.logger().info("before shutdown");

    let started = Instant::now();
    state.monitoring().shutdown();
    state.monitoring().shutdown();
    assert!(started.elapsed() < Duration::from_secs(11));
}
