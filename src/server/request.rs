use std::collections::HashMap;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use log::debug;
use url::{form_urlencoded, Url};

use crate::acl::Resource;

use super::response::Response;
use super::router::{Method, Route};

/// An inbound request, already routed. Header names are lower case.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    route: Route,
    resource: Resource,

    url: String,
    path: String,
    query: Vec<(String, String)>,

    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    /// Routes a request. Unknown paths yield a 404 response, methods the
    /// route does not support a 405 response.
    pub fn parse<I>(method: &str, url: &str, headers: I, body: Vec<u8>) -> Result<Self, Response>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => return Err(Response::bad_request(format!("invalid url: {err}"))),
        };

        let path = parsed.path().to_string();
        let route = match Route::parse(&path) {
            Some(route) => route,
            None => return Err(Response::not_found(format!("No route to {path}"))),
        };

        let method: Method = match method.parse() {
            Ok(method) => method,
            Err(_) => return Err(Response::method_not_allowed(&route.allowed_methods())),
        };
        let resource = match route.resource(method) {
            Some(resource) => resource,
            None => return Err(Response::method_not_allowed(&route.allowed_methods())),
        };

        let query = match parsed.query() {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            None => Vec::new(),
        };
        let headers = headers
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        Ok(Self {
            method,
            route,
            resource,
            url: url.to_string(),
            path,
            query,
            headers,
            body,
        })
    }

    /// Builds the request from actix parts. The url is rebuilt from the
    /// connection info, so it matches what the client signed.
    pub fn from_http(req: &HttpRequest, body: Option<Bytes>) -> Result<Self, Response> {
        let url = {
            let conn = req.connection_info();
            let path = req
                .uri()
                .path_and_query()
                .map(|p| p.as_str())
                .unwrap_or("/");
            format!("{}://{}{}", conn.scheme(), conn.host(), path)
        };

        let mut headers = Vec::with_capacity(req.headers().len());
        for (key, value) in req.headers() {
            let value = match value.to_str() {
                Ok(value) => value.to_string(),
                Err(_) => continue,
            };
            headers.push((key.as_str().to_string(), value));
        }

        let body = body.map(|b| b.to_vec()).unwrap_or_default();
        debug!(
            "- {} {}, peer: {:?}, body: {} bytes",
            req.method(),
            url,
            req.peer_addr(),
            body.len()
        );

        Self::parse(req.method().as_str(), &url, headers, body)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn user(&self) -> Option<&str> {
        self.route.user()
    }

    pub fn image(&self) -> Option<&str> {
        self.route.image()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a repeated query parameter, `name` and `name[]` alike.
    pub fn query_all(&self, name: &str) -> Vec<&str> {
        let array_name = format!("{name}[]");
        self.query
            .iter()
            .filter(|(key, _)| key == name || *key == array_name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The url with the named query parameters removed. The remaining
    /// parameters keep their original encoding and order.
    pub fn url_without(&self, names: &[&str]) -> String {
        let (base, query) = match self.url.split_once('?') {
            Some((base, query)) => (base, query),
            None => return self.url.clone(),
        };

        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let pair: &str = pair;
                if pair.is_empty() {
                    return false;
                }
                let key = pair.split_once('=').map(|(k, _)| k).unwrap_or(pair);
                let key: String = form_urlencoded::parse(key.as_bytes())
                    .map(|(k, _)| k.into_owned())
                    .next()
                    .unwrap_or_default();
                !names.contains(&key.as_str())
            })
            .collect();

        if kept.is_empty() {
            base.to_string()
        } else {
            format!("{base}?{}", kept.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_parse() {
        let req = Request::parse(
            "GET",
            "http://localhost/users/alice/images?page=2&ids[]=a&ids[]=b&publicKey=alice",
            [(String::from("X-Imgstore-PublicKey"), String::from("alice"))],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.resource(), Resource::ImagesGet);
        assert_eq!(req.user(), Some("alice"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_all("ids"), vec!["a", "b"]);
        assert_eq!(req.header("x-imgstore-publickey"), Some("alice"));
        assert_eq!(req.header("X-Imgstore-PublicKey"), Some("alice"));
        assert_eq!(req.path(), "/users/alice/images");

        let err = Request::parse("GET", "http://localhost/nothing", [], Vec::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = Request::parse("PUT", "http://localhost/images", [], Vec::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.header("Allow"), Some("GET, HEAD, OPTIONS"));

        let err = Request::parse("PATCH", "http://localhost/images", [], Vec::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_url_without() {
        let req = Request::parse(
            "GET",
            "http://localhost/users/alice/images?t%5B%5D=thumb&accessToken=abc&page=1",
            [],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(
            req.url_without(&["accessToken"]),
            "http://localhost/users/alice/images?t%5B%5D=thumb&page=1"
        );
        assert_eq!(
            req.url_without(&["accessToken", "t[]", "page"]),
            "http://localhost/users/alice/images"
        );
    }

    #[test]
    fn test_from_http() {
        let req = TestRequest::with_uri("/users/alice/images/abc?publicKey=alice")
            .method(actix_web::http::Method::DELETE)
            .insert_header(("X-Imgstore-Authenticate-Timestamp", "2024-03-01T12:30:00Z"))
            .to_http_request();
        let parsed = Request::from_http(&req, None).unwrap();
        assert_eq!(parsed.resource(), Resource::ImageDelete);
        assert_eq!(
            parsed.url(),
            "http://localhost:8080/users/alice/images/abc?publicKey=alice"
        );
        assert_eq!(
            parsed.header("x-imgstore-authenticate-timestamp"),
            Some("2024-03-01T12:30:00Z")
        );
        assert!(parsed.body().is_empty());
    }
}
