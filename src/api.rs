// API client module: a small blocking client for the Backblaze B2 native
// API. It authorizes once at construction, remembers the bucket it was
// pointed at, and implements `ObjectStore` on top of four calls:
// a metadata HEAD, get-upload-url + upload, and delete-file-version.
//
// Every failure leaves this module as a `crate::Error`; nothing above it
// sees reqwest or B2 error codes.

use crate::error::{Error, Result};
use crate::naming::{encode_key, ObjectKey};
use crate::store::{ObjectHandle, ObjectStore, ProgressFn, ProgressReader};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str =
    "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";

/// Overrides the authorize endpoint, e.g. for a local B2-compatible stub.
pub const AUTHORIZE_URL_ENV: &str = "B2_AUTHORIZE_URL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Session returned by `b2_authorize_account`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    account_id: String,
    authorization_token: String,
    api_url: String,
    download_url: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListBucketsRequest<'a> {
    account_id: &'a str,
    bucket_name: &'a str,
}

#[derive(Deserialize, Debug)]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BucketInfo {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GetUploadUrlRequest<'a> {
    bucket_id: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GetUploadUrlResponse {
    upload_url: String,
    authorization_token: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    file_id: String,
    file_name: String,
    #[serde(default)]
    content_length: Option<u64>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DeleteFileRequest<'a> {
    file_name: &'a str,
    file_id: &'a str,
}

/// Error body B2 sends with every non-2xx response.
#[derive(Deserialize, Debug, Default)]
struct B2ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Authenticated handle on one B2 bucket.
pub struct B2Client {
    client: Client,
    authorization_token: String,
    api_url: String,
    download_url: String,
    bucket_id: String,
    bucket_name: String,
}

impl B2Client {
    /// Authorize with the default endpoint, or `B2_AUTHORIZE_URL` if set.
    pub fn connect(key_id: &str, application_key: &str, bucket_name: &str) -> Result<Self> {
        let authorize_url =
            std::env::var(AUTHORIZE_URL_ENV).unwrap_or_else(|_| DEFAULT_AUTHORIZE_URL.into());
        Self::connect_to(&authorize_url, key_id, application_key, bucket_name)
    }

    /// Authorize the account and look up the bucket. On failure no session
    /// is kept; the caller gets the error and nothing else.
    pub fn connect_to(
        authorize_url: &str,
        key_id: &str,
        application_key: &str,
        bucket_name: &str,
    ) -> Result<Self> {
        // No overall timeout on the client: uploads may take longer than any
        // fixed bound. Metadata calls set their own.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| Error::Unknown(format!("Failed to build HTTP client: {}", e)))?;
        Self::open_session(client, authorize_url, key_id, application_key, bucket_name)
    }

    fn open_session(
        client: Client,
        authorize_url: &str,
        key_id: &str,
        application_key: &str,
        bucket_name: &str,
    ) -> Result<Self> {
        debug!(url = authorize_url, "authorizing account");
        let res = client
            .get(authorize_url)
            .basic_auth(key_id, Some(application_key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(transport_error)?;
        let session: AuthorizeResponse = match read_json(res) {
            Ok(session) => session,
            // Any refusal at this stage means the credentials are unusable.
            Err(Error::NotFound(msg)) | Err(Error::Unknown(msg)) => {
                return Err(Error::Auth(format!("Could not connect to B2: {}", msg)))
            }
            Err(e) => return Err(e),
        };

        let mut client = B2Client {
            client,
            authorization_token: session.authorization_token,
            api_url: session.api_url,
            download_url: session.download_url,
            bucket_id: String::new(),
            bucket_name: bucket_name.to_string(),
        };

        let buckets: ListBucketsResponse = client.call(
            "b2_list_buckets",
            &ListBucketsRequest {
                account_id: &session.account_id,
                bucket_name,
            },
        )?;
        let bucket = buckets
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == bucket_name)
            .ok_or_else(|| Error::NotFound(format!("bucket {}", bucket_name)))?;
        client.bucket_id = bucket.bucket_id;

        info!(bucket = bucket_name, "connected to B2");
        Ok(client)
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// POST a JSON body to `<apiUrl>/b2api/v2/<operation>`.
    fn call<B: Serialize, R: DeserializeOwned>(&self, operation: &str, body: &B) -> Result<R> {
        let url = format!("{}/b2api/v2/{}", self.api_url, operation);
        debug!(operation, "calling B2");
        let res = self
            .authorized(self.client.post(&url))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .map_err(transport_error)?;
        read_json(res)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, &self.authorization_token)
    }

    /// `<downloadUrl>/file/<bucket>/<key>` with every key segment encoded.
    fn download_url_for(&self, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.download_url)
            .map_err(|e| Error::Unknown(format!("bad download URL from B2: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Unknown("download URL cannot take a path".into()))?
            .pop_if_empty()
            .push("file")
            .push(&self.bucket_name)
            .extend(key.split('/'));
        Ok(url)
    }
}

impl ObjectStore for B2Client {
    fn find(&self, key: &str) -> Result<Option<ObjectHandle>> {
        let url = self.download_url_for(key)?;
        let res = self
            .authorized(self.client.head(url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .map_err(transport_error)?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            debug!(key, "object absent");
            return Ok(None);
        }
        if !status.is_success() {
            // HEAD responses carry no body, so only the status is available.
            return Err(classify(status.as_u16(), "", &format!("lookup of {} failed", key)));
        }

        let header = |name: &str| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let id = header("x-bz-file-id")
            .ok_or_else(|| Error::Unknown(format!("B2 returned no file id for {}", key)))?;
        let size = header(CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok());
        debug!(key, id = %id, "object present");
        Ok(Some(ObjectHandle {
            key: key.to_string(),
            id,
            size,
        }))
    }

    fn upload(
        &self,
        local_path: &Path,
        key: &ObjectKey,
        progress: Option<ProgressFn>,
    ) -> Result<ObjectHandle> {
        let (length, digest) = sha1_of(local_path)?;

        let target: GetUploadUrlResponse = self.call(
            "b2_get_upload_url",
            &GetUploadUrlRequest {
                bucket_id: &self.bucket_id,
            },
        )?;

        let file = File::open(local_path)?;
        let body = Body::sized(ProgressReader::new(file, progress), length);

        debug!(key = %key, bytes = length, "uploading");
        let res = self
            .client
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", encode_key(key.as_str()))
            .header(CONTENT_TYPE, "b2/x-auto")
            .header(CONTENT_LENGTH, length)
            .header("X-Bz-Content-Sha1", digest)
            .body(body)
            .send()
            .map_err(transport_error)?;
        let uploaded: FileInfo = read_json(res)?;

        info!(key = %uploaded.file_name, id = %uploaded.file_id, "upload complete");
        Ok(ObjectHandle {
            key: uploaded.file_name,
            id: uploaded.file_id,
            size: uploaded.content_length.or(Some(length)),
        })
    }

    fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        let deleted: FileInfo = self.call(
            "b2_delete_file_version",
            &DeleteFileRequest {
                file_name: &handle.key,
                file_id: &handle.id,
            },
        )?;
        info!(key = %deleted.file_name, "deleted");
        Ok(())
    }
}

/// Length and hex SHA-1 of a local file, as B2 wants them up front.
fn sha1_of(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    let mut length = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        length += n as u64;
    }
    Ok((length, hex::encode(hasher.finalize())))
}

/// Decode a successful JSON response, or classify the B2 error body.
fn read_json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status.is_success() {
        return res
            .json()
            .map_err(|e| Error::Unknown(format!("Unexpected response from B2: {}", e)));
    }
    let txt = res.text().unwrap_or_default();
    let body: B2ErrorBody = serde_json::from_str(&txt).unwrap_or_else(|_| B2ErrorBody {
        code: String::new(),
        message: txt,
    });
    Err(classify(status.as_u16(), &body.code, &body.message))
}

/// Map an HTTP status and B2 error code onto the crate's error kinds.
pub(crate) fn classify(status: u16, code: &str, message: &str) -> Error {
    let detail = if code.is_empty() {
        format!("{} {}", status, message).trim_end().to_string()
    } else {
        format!("{} {}: {}", status, code, message)
    };
    match (status, code) {
        (401, _) | (403, _) => Error::Auth(detail),
        (_, "bad_auth_token") | (_, "expired_auth_token") | (_, "unauthorized") => {
            Error::Auth(detail)
        }
        (404, _) | (_, "not_found") | (_, "file_not_present") | (_, "no_such_file") => {
            Error::NotFound(if message.is_empty() { detail } else { message.to_string() })
        }
        (408, _) | (429, _) | (500..=599, _) => Error::Transient(detail),
        _ => Error::Unknown(detail),
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Error::Transient(err.to_string())
    } else {
        Error::Unknown(err.to_string())
    }
}
