//! Unit tests for connection establishment

use std::io;

use tv_shared::DatabaseConfig;

use crate::database::connection::{
    connect_options, establish, health_check, pool_options, ConnectFailure, PoolStatistics,
    UNREACHABLE_MESSAGE,
};

fn refused_config() -> DatabaseConfig {
    // Nothing listens on port 1
    DatabaseConfig::new("127.0.0.1", "tenantvault_test").with_port(1)
}

#[test]
fn test_connect_options_reject_invalid_uri() {
    let mut config = DatabaseConfig::default();
    config.connection_uri = Some("not a uri".to_string());

    assert!(connect_options(&config).is_err());
}

#[test]
fn test_managed_socket_requires_instance_name() {
    let mut config = DatabaseConfig::default();
    config.managed_socket = true;

    let err = connect_options(&config).unwrap_err();
    assert!(matches!(err, sqlx::Error::Configuration(_)));

    config.instance_connection_name = Some("project:region:instance".to_string());
    assert!(connect_options(&config).is_ok());
}

#[test]
fn test_pool_size_is_at_least_one() {
    let config = DatabaseConfig::default().with_pool_size(0);
    assert_eq!(pool_options(&config).get_max_connections(), 1);

    let config = DatabaseConfig::default().with_pool_size(25);
    assert_eq!(pool_options(&config).get_max_connections(), 25);
}

#[test]
fn test_only_refused_connections_are_retryable() {
    let refused = sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
    assert!(ConnectFailure::classify(refused).is_retryable());

    let denied = sqlx::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied));
    assert!(!ConnectFailure::classify(denied).is_retryable());

    assert!(!ConnectFailure::classify(sqlx::Error::PoolTimedOut).is_retryable());
    assert!(
        !ConnectFailure::classify(sqlx::Error::Configuration("bad option".into())).is_retryable()
    );
}

#[test]
fn test_unreachable_failure_message() {
    let refused = sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
    let err = ConnectFailure::classify(refused).into_storage_error();

    assert!(matches!(err, tv_core::StorageError::Initialization { .. }));
    assert!(err.to_string().contains(UNREACHABLE_MESSAGE));
}

#[tokio::test]
async fn test_establish_against_closed_port_is_retryable() {
    let failure = establish(&refused_config()).await.unwrap_err();
    assert!(failure.is_retryable(), "unexpected failure: {}", failure);
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_establish_and_health_check() {
    let config = DatabaseConfig::from_env();

    let pool = establish(&config).await.unwrap();
    assert!(health_check(&pool).await.unwrap());
    pool.close().await;
}

#[test]
fn test_pool_statistics_display() {
    let stats = PoolStatistics {
        connections: 5,
        idle_connections: 3,
        max_connections: 10,
    };

    let display = format!("{}", stats);
    assert!(display.contains("5/10"));
    assert!(display.contains("3 idle"));
    assert_eq!(stats.in_use(), 2);
}
