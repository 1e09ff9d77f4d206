use super::*;

#[test]
fn test_plain_directory() {
    let source = MigrationSource::parse("/srv/app/db/migrations").unwrap();
    assert_eq!(source.dir(), Path::new("/srv/app/db/migrations"));
}

#[test]
fn test_file_scheme_is_stripped() {
    let source = MigrationSource::parse("file:///home/me/project/db/").unwrap();
    assert_eq!(source.dir(), Path::new("/home/me/project/db/"));
}

#[test]
fn test_migrations_path_override() {
    let source =
        MigrationSource::parse("file:///home/me/project/db/?x-migrations-path=migrations").unwrap();
    assert_eq!(source.dir(), Path::new("/home/me/project/db/migrations"));
}

#[test]
fn test_migrations_path_override_among_other_params() {
    let source =
        MigrationSource::parse("file://./db?foo=bar&x-migrations-path=sql&baz=1").unwrap();
    assert_eq!(source.dir(), Path::new("./db/sql"));
}

#[test]
fn test_unrelated_query_is_ignored() {
    let source = MigrationSource::parse("file://./db?foo=bar").unwrap();
    assert_eq!(source.dir(), Path::new("./db"));
}

#[test]
fn test_empty_override_is_ignored() {
    let source = MigrationSource::parse("./db?x-migrations-path=").unwrap();
    assert_eq!(source.dir(), Path::new("./db"));
}

#[test]
fn test_empty_path_rejected() {
    let err = MigrationSource::parse("   ").unwrap_err();
    assert!(matches!(err, CoreError::InvalidMigrationsPath { .. }));
}

#[test]
fn test_query_only_rejected() {
    let err = MigrationSource::parse("file://?x-migrations-path=sql").unwrap_err();
    assert!(matches!(err, CoreError::InvalidMigrationsPath { .. }));
}

#[test]
fn test_absolute_override_stays_under_base() {
    let source = MigrationSource::parse("file:///home/me/db?x-migrations-path=/migrations").unwrap();
    assert_eq!(source.dir(), Path::new("/home/me/db/migrations"));

    let source = MigrationSource::parse("./db?x-migrations-path=//sql/v2").unwrap();
    assert_eq!(source.dir(), Path::new("./db/sql/v2"));
}

#[test]
fn test_override_cannot_leave_base() {
    for raw in [
        "file:///home/me/db?x-migrations-path=../other",
        "file:///home/me/db?x-migrations-path=sql/../../etc",
    ] {
        let err = MigrationSource::parse(raw).unwrap_err();
        assert!(
            matches!(err, CoreError::InvalidMigrationsPath { .. }),
            "unexpected error for {raw}: {err}"
        );
    }
}
