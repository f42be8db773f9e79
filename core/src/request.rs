//! Request descriptors and wire-request assembly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};

use crate::constants;
use crate::{Error, Result};

/// Request methods accepted by the crowdmap API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET, the only cacheable method.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
}

impl Method {
    /// The wire representation of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether responses to this method are safe to reuse across identical
    /// inputs. Only read-only methods qualify; writes never touch the cache.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Method::Get)
    }

    fn as_http(&self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::config_invalid(format!("invalid method: {s:?}"))),
        }
    }
}

/// A file payload attached to a POST/PUT call.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Form field name.
    pub name: String,
    /// File name reported to the server.
    pub file_name: String,
    /// Mime type of the content.
    pub mime_type: String,
    /// Raw file content.
    pub content: Bytes,
}

/// Request params: an ordered string mapping plus optional file uploads.
///
/// Fields are kept in a sorted map so every serialization of the same params
/// is byte-identical, which cache key derivation relies on.
#[derive(Debug, Clone, Default)]
pub struct Params {
    fields: BTreeMap<String, String>,
    files: Vec<FileUpload>,
}

impl Params {
    /// Create empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder-style file attachment.
    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    /// Insert a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in stable (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Move the attached files out, leaving the fields in place.
    ///
    /// The dispatcher calls this right before transport so file payloads are
    /// never serialized into query or body params.
    pub fn take_files(&mut self) -> Vec<FileUpload> {
        std::mem::take(&mut self.files)
    }

    /// Serialize the fields as an urlencoded query string, in stable order.
    pub fn to_query(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.iter() {
            ser.append_pair(k, v);
        }
        ser.finish()
    }
}

/// Build the full request URL for a resource, honoring the single
/// query-separator rule: `?` unless the resource already carries a query.
fn build_url(resource: &str, query: &str) -> String {
    let mut url = format!(
        "{}://{}{}{}",
        constants::API_SCHEME,
        constants::API_HOST,
        constants::API_BASE_PATH,
        resource
    );
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }
    url
}

/// Assemble the outgoing `http::Request` for one call attempt.
///
/// - GET/DELETE carry params in the query string and no body.
/// - POST/PUT carry params as an urlencoded form body, unless files are
///   attached, in which case params move to the query string and the body is
///   a multipart/form-data stream of the files.
pub fn build_request(
    method: Method,
    resource: &str,
    params: &Params,
    files: &[FileUpload],
) -> Result<http::Request<Bytes>> {
    let query = params.to_query();

    let builder = http::Request::builder()
        .method(method.as_http())
        .header(USER_AGENT, constants::USER_AGENT);

    let req = match method {
        Method::Get | Method::Delete => builder
            .uri(build_url(resource, &query))
            .body(Bytes::new())?,
        Method::Post | Method::Put => {
            if files.is_empty() {
                builder
                    .uri(build_url(resource, ""))
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Bytes::from(query))?
            } else {
                let boundary = format!("----{:016x}", rand::random::<u64>());
                builder
                    .uri(build_url(resource, &query))
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(multipart_body(&boundary, files))?
            }
        }
    };

    Ok(req)
}

/// Write the multipart/form-data body for file uploads.
fn multipart_body(boundary: &str, files: &[FileUpload]) -> Bytes {
    let mut body = Vec::new();
    for file in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                file.name, file.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n", file.mime_type).as_bytes());
        body.extend_from_slice(b"Content-Transfer-Encoding: binary\r\n\r\n");
        body.extend_from_slice(&file.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Bytes::from(body)
}
