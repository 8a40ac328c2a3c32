mod acl;

use super::config::DbConfig;
use super::factory::DbFactory;
use super::Database;

pub fn run_all_tests(db: &Database) {
    image::run_image_tests(db);
    image::run_metadata_tests(db);
    image::run_short_url_tests(db);

    acl::run_key_pair_tests(db);
    acl::run_access_rule_tests(db);
    acl::run_group_tests(db);
}

#[test]
fn test_sqlite_with_cache() {
    let db = Database::new_test();
    run_all_tests(&db);
}

#[test]
fn test_sqlite_without_cache() {
    let db = Database::new_test_no_cache();
    run_all_tests(&db);
}

#[test]
fn test_factory() {
    let cfg = DbConfig::new_test();
    let db = DbFactory::new().build_db(&cfg).unwrap();
    run_all_tests(&db);
}
