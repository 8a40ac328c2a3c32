mod common;

use actix_web::http::StatusCode;
use common::{build, json_body, read, signed};
use imgstore::acl::Resource;
use serde_json::json;

const ADMIN: (&str, &str) = ("admin", "admin-secret");
const BOB: (&str, &str) = ("bob", "bob-secret");

const DATABASE_ACL: &str = r#"
[acl]
name = "database"

[[acl.keys]]
public_key = "admin"
private_key = "admin-secret"

[[acl.keys.rules]]
resources = ["all"]
users = "*"
"#;

#[test]
fn test_keys_and_rules() {
    let pipeline = build("admin-keys", DATABASE_ACL);

    let body = br#"{"privateKey": "bob-secret"}"#.to_vec();
    let resp = signed(&pipeline, "PUT", "/keys/bob", ADMIN, body.clone());
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = signed(&pipeline, "PUT", "/keys/bob", ADMIN, body);
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    assert_eq!(
        read(&pipeline, "HEAD", "/keys/bob?publicKey=admin", ADMIN).status(),
        StatusCode::OK
    );
    assert_eq!(
        read(&pipeline, "HEAD", "/keys/carol?publicKey=admin", ADMIN).status(),
        StatusCode::NOT_FOUND
    );

    // Groups
    let body = br#"{"resources": ["image.get", "metadata.get"]}"#.to_vec();
    let resp = signed(&pipeline, "PUT", "/groups/viewers", ADMIN, body);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = br#"["image.get", "metadata.get", "images.get"]"#.to_vec();
    let resp = signed(&pipeline, "PUT", "/groups/viewers", ADMIN, body);
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = read(&pipeline, "GET", "/groups?publicKey=admin&limit=5", ADMIN);
    let page = json_body(&resp);
    assert_eq!(page["hits"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["groups"][0]["name"], "viewers");

    let resp = signed(&pipeline, "PUT", "/groups/broken", ADMIN, br#"["image.fly"]"#.to_vec());
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Rules
    let body = br#"{"group": "viewers", "users": ["bob"]}"#.to_vec();
    let resp = signed(&pipeline, "POST", "/keys/bob/access", ADMIN, body);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = json_body(&resp)[0]["id"].as_u64().unwrap();

    // A rejected batch stores none of its rules
    let body = br#"[{"resources": ["image.get"], "users": "*"}, {"group": "ghosts", "users": "*"}]"#;
    let resp = signed(&pipeline, "POST", "/keys/bob/access", ADMIN, body.to_vec());
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = read(&pipeline, "GET", "/keys/bob/access?publicKey=admin", ADMIN);
    assert_eq!(json_body(&resp).as_array().map(|a| a.len()), Some(1));

    let path = format!("/keys/bob/access/{id}?publicKey=admin");
    let resp = read(&pipeline, "GET", &path, ADMIN);
    assert_eq!(
        json_body(&resp),
        json!({"id": id, "group": "viewers", "users": ["bob"]})
    );
    let resp = read(&pipeline, "GET", "/keys/bob/access?publicKey=admin", ADMIN);
    assert_eq!(json_body(&resp).as_array().map(|a| a.len()), Some(1));

    // Bob reads through the group, the missing image proves the grant
    let resp = read(&pipeline, "GET", "/users/bob/images/abc?publicKey=bob", BOB);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = read(&pipeline, "GET", "/users/bob?publicKey=bob", BOB);
    assert_eq!(resp.error_code(), Some(107));

    let path = format!("/keys/bob/access/{id}");
    let resp = signed(&pipeline, "DELETE", &path, ADMIN, Vec::new());
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = read(&pipeline, "GET", "/users/bob/images/abc?publicKey=bob", BOB);
    assert_eq!(resp.error_code(), Some(107));

    let resp = signed(&pipeline, "DELETE", "/keys/bob", ADMIN, Vec::new());
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = read(&pipeline, "GET", "/users/bob/images/abc?publicKey=bob", BOB);
    assert_eq!(resp.error_code(), Some(100));
}

#[test]
fn test_static_acl_is_immutable() {
    let pipeline = build(
        "admin-static",
        r#"
        [acl]
        name = "array"

        [[acl.keys]]
        public_key = "admin"
        private_key = "admin-secret"

        [[acl.keys.rules]]
        resources = ["all"]
        users = "*"
        "#,
    );

    let body = br#"{"privateKey": "bob-secret"}"#.to_vec();
    let resp = signed(&pipeline, "PUT", "/keys/bob", ADMIN, body);
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = read(&pipeline, "GET", "/keys/admin/access?publicKey=admin", ADMIN);
    assert_eq!(resp.status(), StatusCode::OK);
    let rules = json_body(&resp);
    assert_eq!(rules[0]["id"], 1);
    assert_eq!(rules[0]["users"], "*");
    assert_eq!(
        rules[0]["resources"].as_array().map(|a| a.len()),
        Some(Resource::ALL.len())
    );
}
