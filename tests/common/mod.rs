#![allow(dead_code)]

use imgstore::config::{CommonConfig, PathSet};
use imgstore::server::config::ServerConfig;
use imgstore::server::factory::ServerFactory;
use imgstore::server::listeners::signature::{
    access_token, sign_request, HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
use imgstore::server::pipeline::Pipeline;
use imgstore::server::request::Request;
use imgstore::server::response::Response;
use imgstore::time::{current_timestamp, format_request_time};
use serde_json::Value;

pub fn build(name: &str, toml_str: &str) -> Pipeline {
    let dir = std::env::temp_dir().join(format!("imgstore-{name}-{}", std::process::id()));
    let ps = PathSet::new(Some(dir.join("config")), Some(dir.join("data"))).unwrap();
    let mut cfg: ServerConfig = toml::from_str(toml_str).unwrap();
    cfg.db.sqlite.memory = true;
    cfg.complete(&ps).unwrap();
    ServerFactory::new(cfg).unwrap().build_pipeline().unwrap()
}

pub fn url(path: &str) -> String {
    format!("http://localhost{path}")
}

pub fn get(pipeline: &Pipeline, method: &str, path: &str) -> Response {
    match Request::parse(method, &url(path), [], Vec::new()) {
        Ok(req) => pipeline.handle(req),
        Err(resp) => resp,
    }
}

/// A read request carrying the access token of `private_key`.
pub fn read(pipeline: &Pipeline, method: &str, path: &str, (_, private_key): (&str, &str)) -> Response {
    let url = url(path);
    let token = access_token(private_key, &url);
    let sep = if url.contains('?') { '&' } else { '?' };
    get(pipeline, method, &format!("{path}{sep}accessToken={token}"))
}

pub fn signed(
    pipeline: &Pipeline,
    method: &str,
    path: &str,
    (public_key, private_key): (&str, &str),
    body: Vec<u8>,
) -> Response {
    let url = url(path);
    let timestamp = format_request_time(current_timestamp());
    let signature = sign_request(private_key, method, &url, public_key, &timestamp);
    let headers = vec![
        (String::from("X-Imgstore-PublicKey"), public_key.to_string()),
        (HEADER_SIGNATURE.to_string(), signature),
        (HEADER_TIMESTAMP.to_string(), timestamp),
    ];
    match Request::parse(method, &url, headers, body) {
        Ok(req) => pipeline.handle(req),
        Err(resp) => resp,
    }
}

pub fn json_body(resp: &Response) -> Value {
    resp.json_body().cloned().unwrap_or(Value::Null)
}
