mod common;

use actix_web::http::StatusCode;
use common::{build, get, json_body, read, signed, url};
use imgstore::server::listeners::signature::{access_token, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use imgstore::server::request::Request;
use imgstore::server::response::Body;
use serde_json::json;

const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

const ACL: &str = r#"
[acl]
name = "array"

[[acl.keys]]
public_key = "alice"
private_key = "alice-secret"

[[acl.keys.rules]]
resources = ["read-write"]
users = ["alice"]

[[acl.keys]]
public_key = "reader"
private_key = "reader-secret"

[[acl.keys.rules]]
group = "viewers"
users = ["alice"]

[acl.groups]
viewers = ["read-only"]
"#;

const ALICE: (&str, &str) = ("alice", "alice-secret");
const READER: (&str, &str) = ("reader", "reader-secret");
const ADMIN: (&str, &str) = ("admin", "admin-secret");

#[test]
fn test_images() {
    let pipeline = build("images", ACL);

    let resp = signed(&pipeline, "POST", "/users/alice/images", ALICE, PNG.to_vec());
    assert_eq!(resp.status(), StatusCode::CREATED);
    let image = json_body(&resp)["imageIdentifier"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(image.len(), 64);
    assert_eq!(json_body(&resp)["mime"], "image/png");

    // Same bytes, same identifier
    let resp = signed(&pipeline, "POST", "/users/alice/images", ALICE, PNG.to_vec());
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(&resp)["imageIdentifier"], image.as_str());

    let resp = signed(
        &pipeline,
        "POST",
        "/users/alice/images",
        ALICE,
        b"not an image".to_vec(),
    );
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let path = format!("/users/alice/images/{image}");
    let resp = read(&pipeline, "GET", &path, ALICE);
    assert_eq!(resp.status(), StatusCode::OK);
    match resp.body() {
        Body::Binary { mime, data } => {
            assert_eq!(mime, "image/png");
            assert_eq!(data.as_slice(), PNG);
        }
        body => panic!("unexpected body {body:?}"),
    }

    let resp = read(&pipeline, "HEAD", &path, ALICE);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body(), &Body::Empty);

    let resp = read(&pipeline, "GET", "/users/alice/images?limit=10", ALICE);
    assert_eq!(json_body(&resp)["search"]["hits"], 1);
    assert_eq!(json_body(&resp)["images"][0]["imageIdentifier"], image.as_str());

    let resp = read(&pipeline, "GET", "/users/alice", ALICE);
    assert_eq!(json_body(&resp), json!({"user": "alice", "numImages": 1}));

    let resp = signed(&pipeline, "DELETE", &path, ALICE, Vec::new());
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = read(&pipeline, "GET", &path, ALICE);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_authorization() {
    let pipeline = build("authorization", ACL);

    // Allow-listed
    assert_eq!(get(&pipeline, "GET", "/status").status(), StatusCode::OK);

    let resp = get(&pipeline, "GET", "/users/mallory/images");
    assert_eq!(resp.error_code(), Some(100));

    let resp = get(&pipeline, "GET", "/images");
    assert_eq!(resp.error_code(), Some(101));

    // Reads of alice's images through the reader group
    let resp = read(&pipeline, "GET", "/users/alice/images?publicKey=reader", READER);
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = read(&pipeline, "GET", "/images?publicKey=reader&users[]=alice", READER);
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = read(
        &pipeline,
        "GET",
        "/images?publicKey=reader&users[]=alice&users[]=bob",
        READER,
    );
    assert_eq!(resp.error_code(), Some(107));

    // Writes need a signature and a read-write grant
    let resp = get(&pipeline, "POST", "/users/alice/images");
    assert_eq!(resp.error_code(), Some(101));

    let resp = signed(&pipeline, "POST", "/users/alice/images", READER, PNG.to_vec());
    assert_eq!(resp.error_code(), Some(107));

    let resp = signed(
        &pipeline,
        "POST",
        "/users/alice/images",
        ("alice", "wrong"),
        PNG.to_vec(),
    );
    assert_eq!(resp.error_code(), Some(103));

    let headers = vec![
        (String::from("X-Imgstore-PublicKey"), String::from("alice")),
        (HEADER_SIGNATURE.to_string(), String::from("00")),
        (HEADER_TIMESTAMP.to_string(), String::from("yesterday")),
    ];
    let req = Request::parse("POST", &url("/users/alice/images"), headers, PNG.to_vec()).unwrap();
    assert_eq!(pipeline.handle(req).error_code(), Some(102));

    // Admin resources are never granted by read-write
    let resp = read(&pipeline, "GET", "/keys/alice/access?publicKey=alice", ALICE);
    assert_eq!(resp.error_code(), Some(107));
}

#[test]
fn test_reads_need_access_token() {
    let pipeline = build(
        "access-token",
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

    // Naming a public key proves nothing
    let resp = get(&pipeline, "GET", "/keys/admin/access?publicKey=admin");
    assert_eq!(resp.error_code(), Some(105));
    let resp = get(&pipeline, "GET", "/stats?publicKey=admin");
    assert_eq!(resp.error_code(), Some(105));

    let resp = read(&pipeline, "GET", "/stats?publicKey=admin", ("admin", "guess"));
    assert_eq!(resp.error_code(), Some(106));

    // A token for one url is not valid for another
    let stats = json_body(&read(&pipeline, "GET", "/stats?publicKey=admin", ADMIN));
    assert_eq!(stats["images"], 0);
    let stolen = access_token("admin-secret", &url("/stats?publicKey=admin"));
    let path = format!("/groups?publicKey=admin&accessToken={stolen}");
    assert_eq!(get(&pipeline, "GET", &path).error_code(), Some(106));

    let resp = read(&pipeline, "GET", "/keys/admin/access?publicKey=admin", ADMIN);
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn test_routing() {
    let pipeline = build("routing", ACL);

    assert_eq!(get(&pipeline, "GET", "/nowhere").status(), StatusCode::NOT_FOUND);

    let resp = get(&pipeline, "PUT", "/status");
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.header("Allow"), Some("GET, HEAD"));

    let resp = read(&pipeline, "OPTIONS", "/users/alice/images/abc/metadata", ALICE);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.header("Allow"),
        Some("GET, HEAD, POST, PUT, DELETE, OPTIONS")
    );
}

#[test]
fn test_metadata_and_short_urls() {
    let pipeline = build("metadata", ACL);

    let resp = signed(&pipeline, "POST", "/users/alice/images", ALICE, PNG.to_vec());
    let image = json_body(&resp)["imageIdentifier"]
        .as_str()
        .unwrap()
        .to_string();
    let path = format!("/users/alice/images/{image}/metadata");

    let resp = read(&pipeline, "GET", &path, ALICE);
    assert_eq!(json_body(&resp), json!({}));

    let body = br#"{"title": "cat", "tags": ["pet"]}"#.to_vec();
    let resp = signed(&pipeline, "PUT", &path, ALICE, body);
    assert_eq!(resp.status(), StatusCode::OK);

    let body = br#"{"title": "dog"}"#.to_vec();
    signed(&pipeline, "POST", &path, ALICE, body);

    let resp = read(&pipeline, "GET", &path, ALICE);
    assert_eq!(json_body(&resp), json!({"title": "dog", "tags": ["pet"]}));
    assert_eq!(resp.header("X-Imgstore-Metadata-Cache"), None);

    // Served from the cache now
    let resp = read(&pipeline, "GET", &path, ALICE);
    assert_eq!(resp.header("X-Imgstore-Metadata-Cache"), Some("Hit"));
    assert_eq!(json_body(&resp), json!({"title": "dog", "tags": ["pet"]}));

    let resp = signed(&pipeline, "PUT", &path, ALICE, b"[1, 2]".to_vec());
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = read(&pipeline, "GET", "/users/alice/images/missing/metadata", ALICE);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Short urls
    let short_path = format!("/users/alice/images/{image}/shorturls");
    let resp = signed(&pipeline, "POST", &short_path, ALICE, Vec::new());
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = json_body(&resp)["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 7);

    let resp = signed(&pipeline, "POST", &short_path, ALICE, Vec::new());
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(&resp)["id"], id.as_str());

    let resp = get(&pipeline, "GET", &format!("/s/{id}"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(matches!(resp.body(), Body::Binary { .. }));

    let image_path = format!("/users/alice/images/{image}");
    signed(&pipeline, "DELETE", &image_path, ALICE, Vec::new());
    let resp = get(&pipeline, "GET", &format!("/s/{id}"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_stats() {
    let pipeline = build(
        "stats",
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

    get(&pipeline, "GET", "/status");
    get(&pipeline, "GET", "/nowhere/at/all/really");
    get(&pipeline, "GET", "/users/nobody/images");

    let resp = read(&pipeline, "GET", "/stats?publicKey=admin", ADMIN);
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(&resp);
    assert_eq!(body["images"], 0);
    // Routing failures never reach the pipeline
    assert_eq!(body["responses"]["total"], 2);
    assert_eq!(body["responses"]["2xx"], 1);
    assert_eq!(body["responses"]["4xx"], 1);
}
